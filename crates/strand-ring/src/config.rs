//! Configuration for a ring node.

use std::time::Duration;

/// How a node treats incoming NotifySuc/NotifyPred announcements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyPolicy {
    /// Accept a candidate only when it lies in the ring interval between
    /// the current pointer and this node, or when the announcement comes
    /// from the current neighbour itself (the clean-departure handoff).
    #[default]
    Guarded,
    /// Overwrite the pointer with whatever was announced. Matches the
    /// historically observed behaviour; vulnerable to stale or
    /// out-of-order announcements.
    Unconditional,
}

/// Tunables for the [`RingEngine`](crate::RingEngine) and its timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingConfig {
    /// Interval between stabilize rounds.
    pub stabilize_interval: Duration,
    /// Age after which an unanswered ping is reported as a failure; also
    /// the interval of the ping audit timer.
    pub ping_timeout: Duration,
    /// Acceptance policy for notify messages.
    pub notify_policy: NotifyPolicy,
}

impl RingConfig {
    /// Create a default config for production use.
    pub fn default_config() -> Self {
        Self {
            stabilize_interval: Duration::from_secs(10),
            ping_timeout: Duration::from_secs(2),
            notify_policy: NotifyPolicy::Guarded,
        }
    }

    /// Create a config suitable for fast test execution.
    pub fn test_config() -> Self {
        Self {
            stabilize_interval: Duration::from_millis(50),
            ping_timeout: Duration::from_millis(250),
            notify_policy: NotifyPolicy::Guarded,
        }
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self::default_config()
    }
}
