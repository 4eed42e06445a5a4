//! Supervision of a single child process.
//!
//! A [`ProcessHandle`] owns one spawned child: stdout and stderr are captured
//! as pipes (never inherited, so diagnostics survive the parent's terminal),
//! and a watcher task delivers exactly one [`ExitNotice`] when the process
//! terminates. There is no kill or timeout; a child runs until it exits or
//! the whole session does.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;

use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::BufReader;
use tokio::process::ChildStderr;
use tokio::process::ChildStdout;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::domain::HandleId;
use crate::domain::LaunchSpec;
use crate::domain::RestartPolicy;

/// Errors from spawning and managing supervised processes.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("launch spec has an empty command")]
    EmptyCommand,

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// Programming error: an operation was called in the wrong lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("unknown handle {0}")]
    UnknownHandle(HandleId),
}

/// Raw exit notification sent by a handle's watcher task.
///
/// Sent exactly once per spawned process, after stderr has been fully
/// drained into the handle's buffer.
#[derive(Debug, Clone, Copy)]
pub struct ExitNotice {
    pub handle_id: HandleId,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

/// Lifecycle state of one process instance. `Exited` is terminal in place;
/// a restart always produces a fresh handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Running,
    Exited(Option<i32>),
}

/// One supervised child process.
#[derive(Debug)]
pub struct ProcessHandle {
    spec: LaunchSpec,
    pid: Option<u32>,
    state: HandleState,
    stderr_buf: Arc<Mutex<Vec<u8>>>,
}

impl ProcessHandle {
    /// Spawn the process described by `spec`.
    ///
    /// Spawn failures (missing executable, exec error) are reported
    /// synchronously. On success the returned handle is `Running` and the
    /// watcher task will send one [`ExitNotice`] carrying `handle_id` on
    /// `exit_tx` when the child terminates.
    pub fn spawn(
        spec: LaunchSpec,
        handle_id: HandleId,
        exit_tx: mpsc::UnboundedSender<ExitNotice>,
    ) -> Result<Self, ProcessError> {
        let Some((program, args)) = spec.command.split_first() else {
            return Err(ProcessError::EmptyCommand);
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                command: spec.command.join(" "),
                source,
            })?;

        let pid = child.id();
        debug!("launched '{}' (pid {:?})", spec.label(), pid);

        if let Some(stdout) = child.stdout.take() {
            drain_stdout(stdout, spec.label());
        }

        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| buffer_stderr(stderr, Arc::clone(&stderr_buf)));

        // Watcher: await the exit, finish draining stderr so the crash
        // snapshot is complete, then deliver the one exit notice.
        tokio::spawn(async move {
            let exit_code = match child.wait().await {
                Ok(status) => status.code(),
                Err(err) => {
                    warn!("error waiting for child {}: {}", handle_id, err);
                    None
                }
            };

            if let Some(task) = stderr_task {
                let _ = task.await;
            }

            if exit_tx
                .send(ExitNotice {
                    handle_id,
                    exit_code,
                })
                .is_err()
            {
                warn!("exit channel closed before child {} was reported", handle_id);
            }
        });

        Ok(Self {
            spec,
            pid,
            state: HandleState::Running,
            stderr_buf,
        })
    }

    /// Spawn a fresh instance with the same command and identity.
    ///
    /// Only legal once this handle has exited; restarting a running process
    /// is a programming error.
    pub fn restart(
        &self,
        handle_id: HandleId,
        exit_tx: mpsc::UnboundedSender<ExitNotice>,
    ) -> Result<Self, ProcessError> {
        if self.is_running() {
            return Err(ProcessError::InvalidState(
                "cannot restart a running process",
            ));
        }
        Self::spawn(self.spec.clone(), handle_id, exit_tx)
    }

    /// Record the terminal exit of this instance. The pid is dropped once
    /// the process is reaped.
    pub fn mark_exited(&mut self, exit_code: Option<i32>) {
        if let HandleState::Exited(_) = self.state {
            warn!("duplicate exit for an already-exited handle");
            return;
        }
        self.state = HandleState::Exited(exit_code);
        self.pid = None;
    }

    /// All stderr output captured so far, as text.
    ///
    /// The buffer is never cleared before exit, so crash diagnostics are
    /// available after the process is gone.
    pub fn stderr_snapshot(&self) -> String {
        self.stderr_buf
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.state == HandleState::Running
    }

    /// Exit code, set exactly once when the process terminated.
    pub fn exit_code(&self) -> Option<i32> {
        match self.state {
            HandleState::Running => None,
            HandleState::Exited(code) => code,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn identity(&self) -> Option<&str> {
        self.spec.identity.as_deref()
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        self.spec.restart_policy
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }
}

/// Forward the child's stdout to the log, line by line.
fn drain_stdout(stdout: ChildStdout, label: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            trace!("[{}] {}", label, line);
        }
    })
}

/// Accumulate the child's stderr into a shared buffer until EOF.
fn buffer_stderr(stderr: ChildStderr, buf: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = stderr;
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    if let Ok(mut guard) = buf.lock() {
                        guard.extend_from_slice(&chunk[..n]);
                    }
                }
                Err(err) => {
                    warn!("error reading child stderr: {}", err);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> LaunchSpec {
        LaunchSpec::new(
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            None,
        )
    }

    #[tokio::test]
    async fn test_spawn_failure_is_synchronous() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let spec = LaunchSpec::new(vec!["/nonexistent-session-test-binary".to_string()], None);

        let err = ProcessHandle::spawn(spec, HandleId(1), tx).unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = ProcessHandle::spawn(LaunchSpec::new(vec![], None), HandleId(1), tx).unwrap_err();
        assert!(matches!(err, ProcessError::EmptyCommand));
    }

    #[tokio::test]
    async fn test_exit_notice_carries_code() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ProcessHandle::spawn(sh("exit 3"), HandleId(7), tx).unwrap();
        assert!(handle.is_running());
        assert!(handle.pid().is_some());

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.handle_id, HandleId(7));
        assert_eq!(notice.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_stderr_snapshot_complete_at_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle =
            ProcessHandle::spawn(sh("echo boom >&2; exit 1"), HandleId(1), tx).unwrap();

        let notice = rx.recv().await.unwrap();
        handle.mark_exited(notice.exit_code);

        // The notice is sent only after stderr is drained.
        assert!(handle.stderr_snapshot().contains("boom"));
        assert_eq!(handle.exit_code(), Some(1));
        assert!(handle.pid().is_none());
    }

    #[tokio::test]
    async fn test_restart_running_is_invalid_state() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = ProcessHandle::spawn(sh("sleep 5"), HandleId(1), tx.clone()).unwrap();

        let err = handle.restart(HandleId(2), tx).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_restart_after_exit_spawns_fresh_instance() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = ProcessHandle::spawn(sh("true"), HandleId(1), tx.clone()).unwrap();

        let notice = rx.recv().await.unwrap();
        handle.mark_exited(notice.exit_code);
        assert!(!handle.is_running());

        let fresh = handle.restart(HandleId(2), tx).unwrap();
        assert!(fresh.is_running());
        assert_eq!(fresh.spec().command, handle.spec().command);

        // The fresh instance reports under its own id.
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.handle_id, HandleId(2));
        assert_eq!(notice.exit_code, Some(0));
    }
}
