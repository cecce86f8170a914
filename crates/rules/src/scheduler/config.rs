use std::time::Duration;

use snoozer_core::config::SchedulerSettings;

/// How many dispatch attempts a rule gets before it is marked FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Fail on the first dispatch error.
    pub const fn no_retry() -> Self {
        Self { max_attempts: 1 }
    }

    /// Whether a rule that has now failed `attempts` times may run again.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    /// Upper bound on dispatches running at once within a tick.
    pub max_concurrent_dispatches: usize,
    pub retry: RetryPolicy,
    /// Claims older than this are considered abandoned.
    pub claim_grace: Duration,
    /// Run the stale-claim sweep every this many ticks (0 disables it).
    pub reconcile_every_ticks: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
            max_concurrent_dispatches: 4,
            retry: RetryPolicy::default(),
            claim_grace: Duration::from_secs(10 * 60),
            reconcile_every_ticks: 10,
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(s: &SchedulerSettings) -> Self {
        Self {
            tick_interval: s.tick_interval(),
            max_concurrent_dispatches: s.max_concurrent_dispatches.max(1),
            retry: RetryPolicy {
                max_attempts: s.dispatch_max_attempts.max(1),
            },
            claim_grace: s.claim_grace(),
            reconcile_every_ticks: s.reconcile_every_ticks,
        }
    }
}
