//! Supervision of the session's process set.
//!
//! Owns the handle-id → [`ProcessHandle`] map. Ids increase monotonically and
//! are never reused: a restarted process gets a fresh id and the old one
//! stays exited forever.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::domain::ChildExit;
use crate::domain::HandleId;
use crate::domain::LaunchSpec;
use crate::process::ExitNotice;
use crate::process::ProcessError;
use crate::process::ProcessHandle;

/// Owns all supervised processes and dispatches their exit notifications.
pub struct ProcessSupervisor {
    handles: BTreeMap<HandleId, ProcessHandle>,
    last_id: u64,
    exit_tx: mpsc::UnboundedSender<ExitNotice>,
}

impl ProcessSupervisor {
    /// Create a supervisor and the receiver its exit notices arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExitNotice>) {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        (
            Self {
                handles: BTreeMap::new(),
                last_id: 0,
                exit_tx,
            },
            exit_rx,
        )
    }

    /// Spawn one process under a fresh handle id.
    pub fn launch(&mut self, spec: LaunchSpec) -> Result<HandleId, ProcessError> {
        let id = HandleId(self.last_id + 1);
        let handle = ProcessHandle::spawn(spec, id, self.exit_tx.clone())?;
        self.last_id += 1;
        self.handles.insert(id, handle);
        Ok(id)
    }

    /// Launch every spec in order, best-effort.
    ///
    /// A single spawn failure is reported and does not prevent the remaining
    /// entries from launching. Returns the ids that did launch, in order.
    pub fn launch_all(&mut self, specs: Vec<LaunchSpec>) -> Vec<HandleId> {
        let mut launched = Vec::with_capacity(specs.len());
        for spec in specs {
            let label = spec.label();
            match self.launch(spec) {
                Ok(id) => launched.push(id),
                Err(err) => error!("failed to launch '{}': {}", label, err),
            }
        }
        launched
    }

    /// Record an exit notice against its handle and build the enriched event
    /// for the session controller.
    ///
    /// Returns `None` for notices whose handle is unknown (never happened in
    /// practice; guarded so a bogus delivery cannot panic the loop).
    pub fn on_exit(&mut self, notice: &ExitNotice) -> Option<ChildExit> {
        let Some(handle) = self.handles.get_mut(&notice.handle_id) else {
            warn!("exit notice for unknown handle {}", notice.handle_id);
            return None;
        };

        handle.mark_exited(notice.exit_code);
        Some(ChildExit {
            handle_id: notice.handle_id,
            identity: handle.identity().map(str::to_owned),
            exit_code: notice.exit_code,
        })
    }

    /// Re-spawn an exited process under a new id.
    ///
    /// The old id remains in the map, exited forever. Fails with
    /// `InvalidState` if the process is still running.
    pub fn restart(&mut self, id: HandleId) -> Result<HandleId, ProcessError> {
        let new_id = HandleId(self.last_id + 1);
        let fresh = {
            let handle = self
                .handles
                .get(&id)
                .ok_or(ProcessError::UnknownHandle(id))?;
            handle.restart(new_id, self.exit_tx.clone())?
        };
        self.last_id += 1;
        self.handles.insert(new_id, fresh);
        info!("restarted {} as {}", id, new_id);
        Ok(new_id)
    }

    /// Stderr snapshot of a handle, for crash reports.
    pub fn stderr_snapshot(&self, id: HandleId) -> Option<String> {
        self.handles.get(&id).map(ProcessHandle::stderr_snapshot)
    }

    pub fn handle(&self, id: HandleId) -> Option<&ProcessHandle> {
        self.handles.get(&id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, identity: Option<&str>) -> LaunchSpec {
        LaunchSpec::new(
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            identity.map(str::to_owned),
        )
    }

    #[tokio::test]
    async fn test_launch_all_is_best_effort() {
        let (mut supervisor, _rx) = ProcessSupervisor::new();

        let launched = supervisor.launch_all(vec![
            sh("true", Some("A")),
            LaunchSpec::new(vec!["/nonexistent-session-test-binary".to_string()], Some("B".to_owned())),
            sh("true", Some("C")),
        ]);

        // B's failure does not prevent C from launching.
        assert_eq!(launched, vec![HandleId(1), HandleId(2)]);
        assert_eq!(supervisor.len(), 2);
        assert_eq!(supervisor.handle(HandleId(1)).unwrap().identity(), Some("A"));
        assert_eq!(supervisor.handle(HandleId(2)).unwrap().identity(), Some("C"));
    }

    #[tokio::test]
    async fn test_exit_event_tagged_with_identity() {
        let (mut supervisor, mut rx) = ProcessSupervisor::new();
        let id = supervisor.launch(sh("exit 7", Some("Network"))).unwrap();

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.handle_id, id);

        let exit = supervisor.on_exit(&notice).unwrap();
        assert_eq!(exit.identity.as_deref(), Some("Network"));
        assert_eq!(exit.exit_code, Some(7));
    }

    #[tokio::test]
    async fn test_restart_yields_new_id_and_old_stays_exited() {
        let (mut supervisor, mut rx) = ProcessSupervisor::new();
        let id = supervisor.launch(sh("true", Some("mod"))).unwrap();

        let notice = rx.recv().await.unwrap();
        supervisor.on_exit(&notice);

        let new_id = supervisor.restart(id).unwrap();
        assert_ne!(new_id, id);
        assert!(supervisor.handle(new_id).unwrap().is_running());

        // The old instance is terminal in place.
        let old = supervisor.handle(id).unwrap();
        assert!(!old.is_running());
        assert_eq!(old.exit_code(), Some(0));
    }

    #[tokio::test]
    async fn test_restart_running_handle_fails() {
        let (mut supervisor, _rx) = ProcessSupervisor::new();
        let id = supervisor.launch(sh("sleep 5", None)).unwrap();

        let err = supervisor.restart(id).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidState(_)));
        // The failed attempt must not consume an id.
        let next = supervisor.launch(sh("true", None)).unwrap();
        assert_eq!(next, HandleId(2));
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let (mut supervisor, _rx) = ProcessSupervisor::new();
        let err = supervisor.restart(HandleId(42)).unwrap_err();
        assert!(matches!(err, ProcessError::UnknownHandle(_)));

        let notice = ExitNotice {
            handle_id: HandleId(42),
            exit_code: Some(0),
        };
        assert!(supervisor.on_exit(&notice).is_none());
    }
}
