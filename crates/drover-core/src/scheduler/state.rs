//! Scheduler state: queues, active set, counters, and the persisted snapshot.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::domain::{HandleId, PendingConfirmation, Task, TaskId};
use crate::scheduler::status::StatusReport;

/// In-memory scheduler state.
///
/// Design:
/// - This is the single source of truth; all mutation goes through the
///   operations on [`Scheduler`](crate::scheduler::Scheduler), each of which
///   persists a [`PersistedState`] snapshot before returning.
/// - A task lives in exactly one of {`primary`, `retry`, `active`,
///   `pending_confirmation`} at a time.
/// - `reserved` holds placeholder reservations for launches still in flight;
///   capacity checks count `active` and `reserved` together so two
///   overlapping dispatch passes cannot overshoot `max_concurrent`.
/// - `closing` marks handles the scheduler is about to close itself, so the
///   resulting destruction event is not reinterpreted as an external close.
#[derive(Debug)]
pub struct SchedulerState {
    pub(crate) primary: VecDeque<Task>,
    pub(crate) retry: VecDeque<Task>,
    pub(crate) active: HashMap<TaskId, Task>,
    pub(crate) completed_count: u64,
    pub(crate) failed_count: u64,
    pub(crate) paused: bool,
    pub(crate) max_concurrent: usize,
    pub(crate) auto_done_on_close: bool,
    pub(crate) pending_confirmation: Option<PendingConfirmation>,

    /// Monotonic for the process lifetime; never reset per batch.
    pub(crate) next_task_id: u64,

    // Transient fields: meaningful only while the process is running.
    pub(crate) reserved: HashSet<TaskId>,
    pub(crate) dispatching: bool,
    pub(crate) closing: HashSet<HandleId>,

    /// Bumped whenever the batch is replaced (enqueue) or wiped (clear), so a
    /// launch that was in flight across the replacement can detect it landed
    /// in a stale batch.
    pub(crate) epoch: u64,
}

/// The serializable snapshot written to the [`StateStore`](crate::ports::StateStore).
///
/// Queues and the active set are stored as plain vectors; tasks carry their
/// own ids, so the active map is rebuilt on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub primary: Vec<Task>,
    pub retry: Vec<Task>,
    pub active: Vec<Task>,
    pub completed_count: u64,
    pub failed_count: u64,
    pub paused: bool,
    pub max_concurrent: usize,
    pub auto_done_on_close: bool,
    pub pending_confirmation: Option<PendingConfirmation>,
    pub next_task_id: u64,
}

impl SchedulerState {
    pub(crate) fn new(config: &SchedulerConfig) -> Self {
        Self {
            primary: VecDeque::new(),
            retry: VecDeque::new(),
            active: HashMap::new(),
            completed_count: 0,
            failed_count: 0,
            paused: false,
            max_concurrent: config.clamp_concurrency(config.max_concurrent),
            auto_done_on_close: config.auto_done_on_close,
            pending_confirmation: None,
            next_task_id: 1,
            reserved: HashSet::new(),
            dispatching: false,
            closing: HashSet::new(),
            epoch: 0,
        }
    }

    /// Rebuild in-memory state from a persisted snapshot.
    ///
    /// `max_concurrent` is re-clamped on load in case the configured cap
    /// shrank since the snapshot was written.
    pub(crate) fn from_persisted(persisted: PersistedState, config: &SchedulerConfig) -> Self {
        let mut state = Self::new(config);
        state.primary = persisted.primary.into();
        state.retry = persisted.retry.into();
        state.active = persisted
            .active
            .into_iter()
            .map(|task| (task.id, task))
            .collect();
        state.completed_count = persisted.completed_count;
        state.failed_count = persisted.failed_count;
        state.paused = persisted.paused;
        state.max_concurrent = config.clamp_concurrency(persisted.max_concurrent);
        state.auto_done_on_close = persisted.auto_done_on_close;
        state.pending_confirmation = persisted.pending_confirmation;
        state.next_task_id = persisted.next_task_id.max(1);
        state
    }

    pub(crate) fn snapshot(&self) -> PersistedState {
        PersistedState {
            primary: self.primary.iter().cloned().collect(),
            retry: self.retry.iter().cloned().collect(),
            active: self.active.values().cloned().collect(),
            completed_count: self.completed_count,
            failed_count: self.failed_count,
            paused: self.paused,
            max_concurrent: self.max_concurrent,
            auto_done_on_close: self.auto_done_on_close,
            pending_confirmation: self.pending_confirmation.clone(),
            next_task_id: self.next_task_id,
        }
    }

    /// Allocate a new TaskId.
    pub(crate) fn allocate_task_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;
        id
    }

    /// Occupied concurrency slots: launched tasks plus in-flight reservations.
    pub(crate) fn in_flight(&self) -> usize {
        self.active.len() + self.reserved.len()
    }

    pub(crate) fn has_capacity(&self) -> bool {
        self.in_flight() < self.max_concurrent
    }

    /// Pop the next dispatchable task; the primary queue has strict priority
    /// over the retry queue.
    pub(crate) fn pop_next(&mut self) -> Option<Task> {
        self.primary.pop_front().or_else(|| self.retry.pop_front())
    }

    /// Route a task through retry accounting.
    ///
    /// Returns `true` when the task was requeued, `false` when its retry
    /// budget is exhausted and it was terminally discarded.
    pub(crate) fn handle_failure(
        &mut self,
        mut task: Task,
        now: DateTime<Utc>,
        max_retries: u32,
    ) -> bool {
        task.release(now);
        task.retries += 1;

        if task.retries <= max_retries {
            tracing::debug!(
                task = %task.id,
                retries = task.retries,
                "task failed; queued for retry"
            );
            self.retry.push_back(task);
            true
        } else {
            tracing::warn!(
                task = %task.id,
                url = %task.url,
                retries = task.retries,
                "retry budget exhausted; task terminally failed"
            );
            self.failed_count += 1;
            false
        }
    }

    pub(crate) fn find_active_by_handle(&self, handle: HandleId) -> Option<TaskId> {
        self.active
            .iter()
            .find(|(_, task)| task.handle == Some(handle))
            .map(|(id, _)| *id)
    }

    pub(crate) fn status(&self) -> StatusReport {
        StatusReport {
            pending: self.primary.len(),
            retrying: self.retry.len(),
            active: self.active.len(),
            completed: self.completed_count,
            failed: self.failed_count,
            paused: self.paused,
            max_concurrent: self.max_concurrent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn config() -> SchedulerConfig {
        SchedulerConfig::default()
    }

    fn task(state: &mut SchedulerState) -> Task {
        let id = state.allocate_task_id();
        Task::new(id, Url::parse("https://example.com/").unwrap())
    }

    #[test]
    fn task_ids_are_monotonic() {
        let mut state = SchedulerState::new(&config());
        let a = state.allocate_task_id();
        let b = state.allocate_task_id();
        assert!(a < b);
        assert_eq!(a, TaskId::new(1));
    }

    #[test]
    fn primary_queue_drains_before_retry_queue() {
        let mut state = SchedulerState::new(&config());
        let retrying = task(&mut state);
        let fresh = task(&mut state);
        state.retry.push_back(retrying.clone());
        state.primary.push_back(fresh.clone());

        assert_eq!(state.pop_next().map(|t| t.id), Some(fresh.id));
        assert_eq!(state.pop_next().map(|t| t.id), Some(retrying.id));
        assert_eq!(state.pop_next(), None);
    }

    #[test]
    fn reservations_count_toward_capacity() {
        let mut state = SchedulerState::new(&config());
        assert_eq!(state.max_concurrent, 2);

        let a = task(&mut state);
        let b = task(&mut state);
        state.reserved.insert(a.id);
        assert!(state.has_capacity());
        state.active.insert(b.id, b);
        assert!(!state.has_capacity());
    }

    #[test]
    fn failure_within_budget_goes_to_retry_tail() {
        let mut state = SchedulerState::new(&config());
        let now = Utc::now();
        let earlier = task(&mut state);
        let failing = task(&mut state);
        state.retry.push_back(earlier.clone());

        assert!(state.handle_failure(failing.clone(), now, 2));
        assert_eq!(state.retry.len(), 2);
        assert_eq!(state.retry.back().map(|t| t.id), Some(failing.id));
        assert_eq!(state.failed_count, 0);
    }

    #[test]
    fn exhausted_budget_is_terminal() {
        let mut state = SchedulerState::new(&config());
        let now = Utc::now();
        let mut failing = task(&mut state);
        failing.retries = 2;

        assert!(!state.handle_failure(failing, now, 2));
        assert!(state.retry.is_empty());
        assert_eq!(state.failed_count, 1);
    }

    #[test]
    fn snapshot_roundtrip_preserves_membership() {
        let mut state = SchedulerState::new(&config());
        let queued = task(&mut state);
        let mut running = task(&mut state);
        running.begin(HandleId::new(5), Utc::now());
        state.primary.push_back(queued);
        state.active.insert(running.id, running);
        state.completed_count = 3;
        state.paused = true;

        let snapshot = state.snapshot();
        let restored = SchedulerState::from_persisted(snapshot.clone(), &config());

        assert_eq!(restored.snapshot().completed_count, 3);
        assert_eq!(restored.primary.len(), 1);
        assert_eq!(restored.active.len(), 1);
        assert!(restored.paused);
        assert_eq!(restored.next_task_id, state.next_task_id);
    }

    #[test]
    fn persisted_max_concurrent_is_reclamped_on_load() {
        let mut snapshot = PersistedState::default();
        snapshot.max_concurrent = 100;
        let state = SchedulerState::from_persisted(snapshot, &config());
        assert_eq!(state.max_concurrent, config().concurrency_cap);
    }
}
