//! Configuration types.

use serde::{Deserialize, Serialize};

/// Scheduler configuration.
///
/// `max_concurrent` is only the initial value; the effective limit lives in
/// scheduler state (it is adjustable at runtime and persisted) and is clamped
/// to `[1, concurrency_cap]` on every write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Initial number of concurrently active tasks.
    pub max_concurrent: usize,

    /// Hard upper bound for `max_concurrent`.
    pub concurrency_cap: usize,

    /// Retry budget: a task whose `retries` exceeds this is terminally failed.
    pub max_retries: u32,

    /// Initial policy for resources destroyed without a done signal:
    /// `true` treats the destruction as a completion, `false` pauses the
    /// scheduler and asks for confirmation.
    pub auto_done_on_close: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            concurrency_cap: 8,
            max_retries: 2,
            auto_done_on_close: false,
        }
    }
}

impl SchedulerConfig {
    /// Clamp a requested concurrency to the allowed range.
    pub fn clamp_concurrency(&self, requested: usize) -> usize {
        requested.clamp(1, self.concurrency_cap)
    }
}
