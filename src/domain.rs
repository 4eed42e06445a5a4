//! Domain types shared across the session daemon.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::activity::ActivityStatus;

/// Externally visible session status.
///
/// Kept as a separate projection of [`ActivityStatus`] so the wire
/// representation can diverge from the internal one later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Idle,
}

impl SessionStatus {
    /// Get the status as the wire string ("active" / "idle").
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
        }
    }
}

impl From<ActivityStatus> for SessionStatus {
    fn from(status: ActivityStatus) -> Self {
        match status {
            ActivityStatus::Active => Self::Active,
            ActivityStatus::Idle => Self::Idle,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restart policy for a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Never restart, regardless of how the crash report is resolved.
    None,
    /// A human decision via the crash report may trigger one re-spawn.
    #[default]
    OnDemand,
}

/// Everything needed to spawn one supervised process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Argv tokens; the first one is the executable.
    pub command: Vec<String>,

    /// Display name shown in logs and crash reports.
    pub identity: Option<String>,

    /// Whether the crash report may offer a restart.
    pub restart_policy: RestartPolicy,
}

impl LaunchSpec {
    /// Create a spec with the default (on-demand) restart policy.
    pub fn new(command: Vec<String>, identity: Option<String>) -> Self {
        Self {
            command,
            identity,
            restart_policy: RestartPolicy::default(),
        }
    }

    /// Label used when reporting on this spec: identity if present,
    /// otherwise the joined command line.
    pub fn label(&self) -> String {
        self.identity
            .clone()
            .unwrap_or_else(|| self.command.join(" "))
    }
}

/// Identifier of one supervised process instance.
///
/// Ids increase monotonically and are never reused, so a stale exit
/// delivery after a restart cannot be misattributed to the new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Exit event forwarded to the session controller, tagged with the
/// originating handle's identity.
#[derive(Debug, Clone)]
pub struct ChildExit {
    pub handle_id: HandleId,
    pub identity: Option<String>,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}
