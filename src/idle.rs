//! Idle-time providers.
//!
//! Abstraction over OS input-idle queries: how many seconds have elapsed
//! since the last mouse/keyboard event.

mod x11;

use thiserror::Error;
pub use x11::X11IdleSource;

/// Source of elapsed idle seconds.
///
/// Opening a provider is a startup precondition; a failed *sample* is a
/// recoverable, per-tick condition.
pub trait IdleProvider: Send + 'static {
    /// Query the time since the last user input, in whole seconds.
    fn query_idle_seconds(&mut self) -> Result<u64, IdleError>;
}

/// Errors from idle-time providers.
#[derive(Error, Debug)]
pub enum IdleError {
    /// The provider could not be opened at all. Fatal for the session.
    #[error("failed to open idle provider: {0}")]
    Init(String),

    /// A single query failed; the caller skips this sample.
    #[error("idle provider unavailable: {0}")]
    Unavailable(String),
}
