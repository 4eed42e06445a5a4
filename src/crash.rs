//! Crash reporting for supervised processes.
//!
//! A non-zero exit is always surfaced to a human through a
//! [`CrashPresenter`]; the report's resolution is the sole input to the
//! restart decision.

use async_trait::async_trait;
use tracing::error;

/// Outcome of a crash report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashResolution {
    /// Acknowledge the crash, leave the process exited.
    Dismiss,
    /// Re-spawn the crashed process once.
    Restart,
}

/// Presentation collaborator for crash reports.
///
/// Implementations own the dialog/notification surface; `report` resolves
/// once the human has decided.
#[async_trait]
pub trait CrashPresenter: Send + Sync {
    async fn report(&self, identity: Option<&str>, stderr_text: &str) -> CrashResolution;
}

/// Presenter that writes the report to the log and dismisses.
///
/// Used when no dialog frontend is wired up, so crashes are still never
/// silently dropped.
pub struct LogPresenter;

#[async_trait]
impl CrashPresenter for LogPresenter {
    async fn report(&self, identity: Option<&str>, stderr_text: &str) -> CrashResolution {
        match identity {
            Some(name) => error!("application '{}' exited unexpectedly", name),
            None => error!("an application exited unexpectedly"),
        }
        if !stderr_text.is_empty() {
            error!("captured stderr:\n{}", stderr_text.trim_end());
        }
        CrashResolution::Dismiss
    }
}
