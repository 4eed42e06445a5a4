//! Idle time via the X11 MIT-SCREEN-SAVER extension.
//!
//! Queries `ms_since_user_input` against the root window, the same counter
//! `xscreensaver` itself uses.

use tracing::debug;
use x11rb::connection::Connection;
use x11rb::connection::RequestConnection;
use x11rb::protocol::screensaver;
use x11rb::protocol::screensaver::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;

use super::IdleError;
use super::IdleProvider;

/// Idle source backed by an X display connection.
pub struct X11IdleSource {
    conn: RustConnection,
    root: u32,
}

impl X11IdleSource {
    /// Open the display and resolve the root window.
    ///
    /// Fails with [`IdleError::Init`] when there is no usable display or the
    /// server lacks the screensaver extension.
    pub fn open() -> Result<Self, IdleError> {
        let (conn, screen_num) =
            x11rb::connect(None).map_err(|e| IdleError::Init(e.to_string()))?;

        let present = conn
            .extension_information(screensaver::X11_EXTENSION_NAME)
            .map_err(|e| IdleError::Init(e.to_string()))?
            .is_some();
        if !present {
            return Err(IdleError::Init(
                "X server does not support the MIT-SCREEN-SAVER extension".to_string(),
            ));
        }

        let root = conn.setup().roots[screen_num].root;
        debug!("opened X display, screen {}, root window {:#x}", screen_num, root);

        Ok(Self { conn, root })
    }
}

impl IdleProvider for X11IdleSource {
    fn query_idle_seconds(&mut self) -> Result<u64, IdleError> {
        let reply = self
            .conn
            .screensaver_query_info(self.root)
            .map_err(|e| IdleError::Unavailable(e.to_string()))?
            .reply()
            .map_err(|e| IdleError::Unavailable(e.to_string()))?;

        Ok(ms_to_seconds(reply.ms_since_user_input))
    }
}

/// Round milliseconds since last input to whole seconds.
fn ms_to_seconds(ms: u32) -> u64 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let seconds = (f64::from(ms) / 1000.0).round() as u64;
    seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_rounding() {
        assert_eq!(ms_to_seconds(0), 0);
        assert_eq!(ms_to_seconds(499), 0);
        assert_eq!(ms_to_seconds(500), 1);
        assert_eq!(ms_to_seconds(4_999), 5);
        assert_eq!(ms_to_seconds(5_000), 5);
        assert_eq!(ms_to_seconds(5_400), 5);
    }
}
