//! Task record: one unit of queued work targeting one URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{HandleId, TaskId};

/// Metadata for a task moving through the scheduler.
///
/// Design:
/// - The queues and the active set own `Task` values directly; a task is in
///   exactly one of {primary queue, retry queue, active set, pending
///   confirmation} at any time.
/// - Lifecycle position is expressed by which collection holds the task, not
///   by a state field, so placement and state cannot disagree.
/// - `retries` only increases. Active time is accumulated into
///   `total_time_ms` across attempts so a retried task keeps its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub url: Url,

    /// Number of times this task has been routed through failure handling.
    pub retries: u32,

    /// External resource handle; present only while the task is active.
    pub handle: Option<HandleId>,

    /// When the current attempt started; cleared whenever the attempt ends.
    pub started_at: Option<DateTime<Utc>>,

    /// Total active time accumulated across all attempts, in milliseconds.
    pub total_time_ms: u64,
}

impl Task {
    pub fn new(id: TaskId, url: Url) -> Self {
        Self {
            id,
            url,
            retries: 0,
            handle: None,
            started_at: None,
            total_time_ms: 0,
        }
    }

    /// Mark the task as launched: record its handle and attempt start time.
    pub fn begin(&mut self, handle: HandleId, now: DateTime<Utc>) {
        self.handle = Some(handle);
        self.started_at = Some(now);
    }

    /// Fold the elapsed time of the current attempt into `total_time_ms` and
    /// close the attempt window. No-op when no attempt is running.
    pub fn absorb_elapsed(&mut self, now: DateTime<Utc>) {
        if let Some(started_at) = self.started_at.take() {
            let elapsed = (now - started_at).num_milliseconds().max(0) as u64;
            self.total_time_ms += elapsed;
        }
    }

    /// End the current attempt entirely: absorb time and drop the handle.
    pub fn release(&mut self, now: DateTime<Utc>) {
        self.absorb_elapsed(now);
        self.handle = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn task() -> Task {
        Task::new(TaskId::new(1), Url::parse("https://example.com/a").unwrap())
    }

    #[test]
    fn begin_records_handle_and_start() {
        let now = Utc::now();
        let mut t = task();
        t.begin(HandleId::new(7), now);

        assert_eq!(t.handle, Some(HandleId::new(7)));
        assert_eq!(t.started_at, Some(now));
    }

    #[test]
    fn absorb_accumulates_across_attempts() {
        let t0 = Utc::now();
        let mut t = task();

        t.begin(HandleId::new(1), t0);
        t.absorb_elapsed(t0 + TimeDelta::milliseconds(250));
        assert_eq!(t.total_time_ms, 250);
        assert_eq!(t.started_at, None);

        t.begin(HandleId::new(2), t0 + TimeDelta::seconds(10));
        t.absorb_elapsed(t0 + TimeDelta::seconds(10) + TimeDelta::milliseconds(750));
        assert_eq!(t.total_time_ms, 1000);
    }

    #[test]
    fn absorb_without_attempt_is_noop() {
        let mut t = task();
        t.absorb_elapsed(Utc::now());
        assert_eq!(t.total_time_ms, 0);
    }

    #[test]
    fn release_clears_handle() {
        let now = Utc::now();
        let mut t = task();
        t.begin(HandleId::new(3), now);
        t.release(now + TimeDelta::milliseconds(10));

        assert_eq!(t.handle, None);
        assert_eq!(t.started_at, None);
        assert_eq!(t.total_time_ms, 10);
    }

    #[test]
    fn task_roundtrips_through_json() {
        let now = Utc::now();
        let mut t = task();
        t.begin(HandleId::new(9), now);

        let json = serde_json::to_string(&t).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
