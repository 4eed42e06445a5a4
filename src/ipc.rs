//! `DBus` surface for the session object.
//!
//! Exposes `org.cream.Session` at `/org/cream/Session`: `GetStatus`,
//! `Suspend`, `Hibernate` and the `StatusChanged` signal. This layer only
//! translates between the bus and the controller's channels; the core never
//! sees `DBus` types.

use anyhow::Context;
use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;
use zbus::object_server::SignalEmitter;

use crate::session::SessionCommand;
use crate::session::SessionNotification;
use crate::session::StatusHandle;

/// Well-known bus name of the session object.
pub const BUS_NAME: &str = "org.cream.Session";

/// Object path of the session object.
pub const OBJECT_PATH: &str = "/org/cream/Session";

struct SessionIface {
    status: StatusHandle,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionIface {
    fn enqueue(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            warn!("session loop is gone, dropping {:?} request", command);
        }
    }
}

#[zbus::interface(name = "org.cream.Session")]
impl SessionIface {
    /// Current session status, "active" or "idle".
    fn get_status(&self) -> String {
        self.status.get().as_str().to_owned()
    }

    /// Request a suspend; returns before the power call is made.
    fn suspend(&self) {
        self.enqueue(SessionCommand::Suspend);
    }

    /// Request a hibernate; returns before the power call is made.
    fn hibernate(&self) {
        self.enqueue(SessionCommand::Hibernate);
    }

    #[zbus(signal)]
    async fn status_changed(emitter: &SignalEmitter<'_>, status: &str) -> zbus::Result<()>;
}

/// Register the session object on the session bus and bridge the
/// controller's notifications to `StatusChanged` signals.
///
/// The returned connection must be kept alive for the object to stay
/// registered.
pub async fn serve(
    status: StatusHandle,
    commands: mpsc::UnboundedSender<SessionCommand>,
    mut notifications: mpsc::UnboundedReceiver<SessionNotification>,
    cancel: CancellationToken,
) -> Result<zbus::Connection> {
    let iface = SessionIface { status, commands };

    let conn = zbus::connection::Builder::session()
        .context("Failed to connect to session DBus")?
        .name(BUS_NAME)
        .context("Failed to request bus name")?
        .serve_at(OBJECT_PATH, iface)
        .context("Failed to register session object")?
        .build()
        .await
        .context("Failed to set up session bus connection")?;

    info!("registered {} at {}", BUS_NAME, OBJECT_PATH);

    let iface_ref = conn
        .object_server()
        .interface::<_, SessionIface>(OBJECT_PATH)
        .await
        .context("Session interface not found after registration")?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                maybe = notifications.recv() => {
                    let Some(SessionNotification::StatusChanged(status)) = maybe else {
                        break;
                    };
                    if let Err(err) =
                        SessionIface::status_changed(iface_ref.signal_emitter(), status.as_str())
                            .await
                    {
                        warn!("failed to emit StatusChanged: {}", err);
                    }
                }
            }
        }
    });

    Ok(conn)
}
