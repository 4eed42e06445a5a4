//! Session controller.
//!
//! Owns one activity monitor and one process supervisor, drives the single
//! event loop, and exposes the session's external operations: status reads,
//! deferred suspend/hibernate, status-change notifications and crash
//! reporting with human-gated restart.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::activity::ActivityStatus;
use crate::crash::CrashPresenter;
use crate::crash::CrashResolution;
use crate::domain::ChildExit;
use crate::domain::HandleId;
use crate::domain::RestartPolicy;
use crate::domain::SessionStatus;
use crate::launch::AutostartEnumerator;
use crate::launch::ModuleRegistry;
use crate::power::PowerManager;
use crate::process::ExitNotice;
use crate::supervisor::ProcessSupervisor;

/// Inbound IPC operations handled by the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Suspend,
    Hibernate,
}

/// Outbound notifications for the external signaling channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionNotification {
    /// Fired once per activity transition.
    StatusChanged(SessionStatus),
}

/// Shared, read-only view of the externally visible status.
///
/// Updated only by the controller loop; `get_status` callers read it without
/// going through the loop.
#[derive(Clone)]
pub struct StatusHandle {
    idle: Arc<AtomicBool>,
}

impl StatusHandle {
    fn new() -> Self {
        Self {
            idle: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Most recently published status.
    pub fn get(&self) -> SessionStatus {
        if self.idle.load(Ordering::Relaxed) {
            SessionStatus::Idle
        } else {
            SessionStatus::Active
        }
    }

    fn set(&self, status: SessionStatus) {
        self.idle
            .store(status == SessionStatus::Idle, Ordering::Relaxed);
    }
}

/// Endpoints handed out when a controller is created: the status view for
/// IPC reads, the command sender for inbound calls, the sender the activity
/// monitor reports on, and the outbound notification stream.
pub struct SessionHandles {
    pub status: StatusHandle,
    pub commands: mpsc::UnboundedSender<SessionCommand>,
    pub activity_events: mpsc::UnboundedSender<ActivityStatus>,
    pub notifications: mpsc::UnboundedReceiver<SessionNotification>,
}

/// Top-level coordinator of the session.
pub struct SessionController {
    supervisor: ProcessSupervisor,
    status: StatusHandle,
    power: Arc<dyn PowerManager>,
    presenter: Arc<dyn CrashPresenter>,
    status_rx: mpsc::UnboundedReceiver<ActivityStatus>,
    exit_rx: mpsc::UnboundedReceiver<ExitNotice>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    notify_tx: mpsc::UnboundedSender<SessionNotification>,
}

impl SessionController {
    /// Wire up a controller around a supervisor and its exit stream.
    pub fn new(
        supervisor: ProcessSupervisor,
        exit_rx: mpsc::UnboundedReceiver<ExitNotice>,
        power: Arc<dyn PowerManager>,
        presenter: Arc<dyn CrashPresenter>,
    ) -> (Self, SessionHandles) {
        let (activity_tx, status_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let status = StatusHandle::new();

        let controller = Self {
            supervisor,
            status: status.clone(),
            power,
            presenter,
            status_rx,
            exit_rx,
            command_rx,
            notify_tx,
        };

        let handles = SessionHandles {
            status,
            commands: command_tx,
            activity_events: activity_tx,
            notifications: notify_rx,
        };

        (controller, handles)
    }

    /// Launch the configured session modules, best-effort.
    pub fn launch_modules(&mut self, registry: &dyn ModuleRegistry) -> Vec<HandleId> {
        let specs = registry.entries();
        info!("launching {} session module(s)", specs.len());
        self.supervisor.launch_all(specs)
    }

    /// Launch the autostart applications, best-effort. Runs after the
    /// modules, preserving the two-phase startup ordering.
    pub fn launch_autostart(&mut self, autostart: &dyn AutostartEnumerator) -> Vec<HandleId> {
        let specs = autostart.entries();
        info!("running autostart ({} entries)", specs.len());
        self.supervisor.launch_all(specs)
    }

    /// Drive the event loop until the token fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("session controller shutting down");
                    break;
                }
                Some(status) = self.status_rx.recv() => self.on_status_changed(status),
                Some(notice) = self.exit_rx.recv() => self.on_child_exit(notice).await,
                Some(command) = self.command_rx.recv() => self.on_command(command),
            }
        }
    }

    /// Publish a new status and emit exactly one notification.
    fn on_status_changed(&mut self, status: ActivityStatus) {
        let projected = SessionStatus::from(status);
        self.status.set(projected);
        debug!("session is {}", projected);
        let _ = self
            .notify_tx
            .send(SessionNotification::StatusChanged(projected));
    }

    /// Handle a child exit: clean exits are logged only, anything else is
    /// surfaced as a crash report whose resolution gates the restart.
    async fn on_child_exit(&mut self, notice: ExitNotice) {
        let Some(exit) = self.supervisor.on_exit(&notice) else {
            return;
        };

        if exit.exit_code == Some(0) {
            debug!("child '{}' exited cleanly", label(&exit));
            return;
        }

        warn!(
            "child '{}' exited with {}",
            label(&exit),
            exit.exit_code
                .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"))
        );

        let stderr = self
            .supervisor
            .stderr_snapshot(exit.handle_id)
            .unwrap_or_default();

        let resolution = self.presenter.report(exit.identity.as_deref(), &stderr).await;
        if resolution == CrashResolution::Restart {
            self.try_restart(&exit);
        }
    }

    fn try_restart(&mut self, exit: &ChildExit) {
        let policy = self
            .supervisor
            .handle(exit.handle_id)
            .map(|h| h.restart_policy());

        if policy != Some(RestartPolicy::OnDemand) {
            warn!("restart not permitted for '{}'", label(exit));
            return;
        }

        if let Err(err) = self.supervisor.restart(exit.handle_id) {
            warn!("failed to restart '{}': {}", label(exit), err);
        }
    }

    /// Defer the power-management call to a later loop iteration so the
    /// inbound request returns without blocking on `DBus` I/O.
    fn on_command(&mut self, command: SessionCommand) {
        let power = Arc::clone(&self.power);
        match command {
            SessionCommand::Suspend => {
                debug!("suspending…");
                tokio::spawn(async move { power.suspend().await });
            }
            SessionCommand::Hibernate => {
                debug!("hibernating…");
                tokio::spawn(async move { power.hibernate().await });
            }
        }
    }
}

fn label(exit: &ChildExit) -> String {
    exit.identity
        .clone()
        .unwrap_or_else(|| exit.handle_id.to_string())
}
