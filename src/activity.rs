//! Activity state machine with adaptive polling.
//!
//! Converts idle-time samples into a two-state active/idle status. Polling is
//! self-scheduling: each tick rearms the timer with the interval of the state
//! it landed in (slow while active, fast while idle so the return of input is
//! noticed quickly).

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::idle::IdleProvider;

/// Seconds of inactivity after which the session counts as idle.
pub const IDLE_TIME: u64 = 5;

/// Poll interval while the session is active.
pub const ACTIVE_POLL: Duration = Duration::from_millis(1000);

/// Poll interval while the session is idle.
pub const IDLE_POLL: Duration = Duration::from_millis(100);

/// Internal activity status, owned exclusively by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityStatus {
    Active,
    Idle,
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Idle => f.write_str("idle"),
        }
    }
}

/// Samples an [`IdleProvider`] and tracks status transitions.
pub struct ActivityMonitor<P> {
    provider: P,
    status: ActivityStatus,
    idle_threshold: u64,
    active_poll: Duration,
    idle_poll: Duration,
}

impl<P: IdleProvider> ActivityMonitor<P> {
    /// Create a monitor in the initial `Active` state.
    pub fn new(provider: P, idle_threshold: u64, active_poll: Duration, idle_poll: Duration) -> Self {
        Self {
            provider,
            status: ActivityStatus::Active,
            idle_threshold,
            active_poll,
            idle_poll,
        }
    }

    /// Create a monitor with the stock thresholds.
    pub fn with_defaults(provider: P) -> Self {
        Self::new(provider, IDLE_TIME, ACTIVE_POLL, IDLE_POLL)
    }

    /// Current status.
    pub fn status(&self) -> ActivityStatus {
        self.status
    }

    /// Delay before the next tick, a pure function of the current status.
    pub fn poll_interval(&self) -> Duration {
        match self.status {
            ActivityStatus::Active => self.active_poll,
            ActivityStatus::Idle => self.idle_poll,
        }
    }

    /// Sample the provider once and apply the transition rule.
    ///
    /// Returns `Some(new_status)` on a transition, `None` on a no-op tick.
    /// A failed sample skips the tick entirely; the status is unchanged and
    /// the same reschedule policy applies.
    pub fn tick(&mut self) -> Option<ActivityStatus> {
        let idle = match self.provider.query_idle_seconds() {
            Ok(seconds) => seconds,
            Err(err) => {
                warn!("failed to sample idle time: {}", err);
                return None;
            }
        };

        let target = if idle >= self.idle_threshold {
            ActivityStatus::Idle
        } else {
            ActivityStatus::Active
        };

        if target == self.status {
            trace!("idle {}s, session stays {}", idle, self.status);
            return None;
        }

        self.status = target;
        debug!("session is {} (idle {}s)", self.status, idle);
        Some(target)
    }

    /// Start the self-scheduling sampling task.
    ///
    /// One `StatusChanged` value is sent per transition; no-op ticks send
    /// nothing. The task stops when the token fires or the receiver is gone.
    pub fn spawn(
        mut self,
        events: mpsc::UnboundedSender<ActivityStatus>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "activity monitor started (threshold {}s, poll {:?}/{:?})",
                self.idle_threshold, self.active_poll, self.idle_poll
            );

            loop {
                if let Some(status) = self.tick()
                    && events.send(status).is_err()
                {
                    break;
                }

                // Rearm with the interval of the state this tick landed in.
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(self.poll_interval()) => {}
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idle::IdleError;
    use std::collections::VecDeque;

    /// Provider that replays a scripted sequence of samples.
    struct ScriptedProvider {
        samples: VecDeque<Result<u64, IdleError>>,
    }

    impl ScriptedProvider {
        fn new(samples: impl IntoIterator<Item = u64>) -> Self {
            Self {
                samples: samples.into_iter().map(Ok).collect(),
            }
        }
    }

    impl IdleProvider for ScriptedProvider {
        fn query_idle_seconds(&mut self) -> Result<u64, IdleError> {
            self.samples
                .pop_front()
                .unwrap_or(Err(IdleError::Unavailable("script exhausted".to_string())))
        }
    }

    fn monitor(samples: impl IntoIterator<Item = u64>) -> ActivityMonitor<ScriptedProvider> {
        ActivityMonitor::with_defaults(ScriptedProvider::new(samples))
    }

    #[test]
    fn test_initial_state_is_active() {
        let m = monitor([]);
        assert_eq!(m.status(), ActivityStatus::Active);
        assert_eq!(m.poll_interval(), ACTIVE_POLL);
    }

    #[test]
    fn test_threshold_crossing_goes_idle_within_one_tick() {
        let mut m = monitor([5]);
        assert_eq!(m.tick(), Some(ActivityStatus::Idle));
        assert_eq!(m.status(), ActivityStatus::Idle);
    }

    #[test]
    fn test_below_threshold_stays_active_silently() {
        let mut m = monitor([4]);
        assert_eq!(m.tick(), None);
        assert_eq!(m.status(), ActivityStatus::Active);
    }

    #[test]
    fn test_one_event_per_transition() {
        // Samples [2, 3, 6, 7, 2] with threshold 5 must yield exactly two
        // events: idle at 6, active at the final 2.
        let mut m = monitor([2, 3, 6, 7, 2]);
        let events: Vec<_> = (0..5).filter_map(|_| m.tick()).collect();
        assert_eq!(
            events,
            vec![ActivityStatus::Idle, ActivityStatus::Active]
        );
    }

    #[test]
    fn test_poll_interval_follows_status() {
        let mut m = monitor([6, 1]);

        assert_eq!(m.tick(), Some(ActivityStatus::Idle));
        assert_eq!(m.poll_interval(), IDLE_POLL);

        assert_eq!(m.tick(), Some(ActivityStatus::Active));
        assert_eq!(m.poll_interval(), ACTIVE_POLL);
    }

    #[test]
    fn test_failed_sample_skips_tick() {
        let mut m = ActivityMonitor::with_defaults(ScriptedProvider {
            samples: VecDeque::from([
                Err(IdleError::Unavailable("display gone".to_string())),
                Ok(7),
            ]),
        });

        // Error tick: no event, state unchanged, reschedule as active.
        assert_eq!(m.tick(), None);
        assert_eq!(m.status(), ActivityStatus::Active);
        assert_eq!(m.poll_interval(), ACTIVE_POLL);

        // The machine keeps going on the next good sample.
        assert_eq!(m.tick(), Some(ActivityStatus::Idle));
    }

    #[tokio::test]
    async fn test_spawned_monitor_delivers_transitions() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let m = ActivityMonitor::new(
            ScriptedProvider::new([0, 9, 9, 0]),
            IDLE_TIME,
            Duration::from_millis(1),
            Duration::from_millis(1),
        );
        m.spawn(tx, cancel.clone());

        assert_eq!(rx.recv().await, Some(ActivityStatus::Idle));
        assert_eq!(rx.recv().await, Some(ActivityStatus::Active));
        cancel.cancel();
    }
}
