//! The scheduler: dispatch loop, completion protocol, and crash recovery.

mod state;
mod status;

pub use state::PersistedState;
pub use status::{EnqueueReceipt, StatusReport};

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SchedulerConfig;
use crate::domain::{Decision, HandleId, PendingConfirmation, Signal, Task, TaskId};
use crate::error::DroverError;
use crate::ports::{Clock, ResourceLauncher, StateStore};
use state::SchedulerState;

/// Bounded-concurrency scheduler for long-running remote jobs.
///
/// One logical instance per process. All state lives behind a single mutex;
/// external operations (resource launch, storage writes, liveness probes) are
/// awaited with the lock released, and every operation persists a snapshot
/// before it returns, so state observed after any operation is durable.
#[derive(Clone)]
pub struct Scheduler {
    state: Arc<Mutex<SchedulerState>>,
    launcher: Arc<dyn ResourceLauncher>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler with fresh (empty) state.
    pub fn new(
        launcher: Arc<dyn ResourceLauncher>,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        let state = SchedulerState::new(&config);
        Self {
            state: Arc::new(Mutex::new(state)),
            launcher,
            store,
            clock,
            config,
        }
    }

    /// Load persisted state and reconcile it against live resources.
    ///
    /// Tasks persisted as active whose handle no longer refers to a live
    /// resource go through failure/retry accounting; live ones stay active (a
    /// scheduler restart is not a resource crash). Liveness of the handle is
    /// the only distinguishing signal. Afterwards, dispatch resumes unless
    /// the snapshot was paused.
    pub async fn restore(
        launcher: Arc<dyn ResourceLauncher>,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Result<Self, DroverError> {
        let scheduler = match store.load().await? {
            Some(persisted) => {
                let state = SchedulerState::from_persisted(persisted, &config);
                Self {
                    state: Arc::new(Mutex::new(state)),
                    launcher,
                    store,
                    clock,
                    config,
                }
            }
            None => Self::new(launcher, store, clock, config),
        };

        let entries: Vec<(TaskId, Option<HandleId>)> = {
            let state = scheduler.state.lock().await;
            state
                .active
                .iter()
                .map(|(id, task)| (*id, task.handle))
                .collect()
        };

        let mut dead = Vec::new();
        for (id, handle) in entries {
            let live = match handle {
                Some(handle) => scheduler.launcher.is_live(handle).await,
                None => false,
            };
            if !live {
                dead.push(id);
            }
        }

        let snapshot = {
            let mut state = scheduler.state.lock().await;
            let now = scheduler.clock.now();
            for id in dead {
                if let Some(task) = state.active.remove(&id) {
                    warn!(
                        task = %task.id,
                        url = %task.url,
                        "active task lost its resource across restart; reconciling as failure"
                    );
                    state.handle_failure(task, now, scheduler.config.max_retries);
                }
            }
            state.snapshot()
        };
        scheduler.store.save(&snapshot).await?;

        if !snapshot.paused {
            scheduler.schedule().await?;
        }
        Ok(scheduler)
    }

    /// Replace the batch with a new set of URLs.
    ///
    /// Malformed URLs are dropped and reported in the receipt; they are not
    /// queued and not counted as failures. Any currently active resources are
    /// released first, the retry queue is cleared, both counters reset, and
    /// the scheduler unpauses, so enqueueing is idempotent with respect to
    /// prior state. Task ids continue from the process-wide counter.
    pub async fn enqueue(&self, urls: &[String]) -> Result<EnqueueReceipt, DroverError> {
        let mut accepted = Vec::new();
        let mut rejected = 0usize;
        for raw in urls {
            match Url::parse(raw.trim()) {
                Ok(url) => accepted.push(url),
                Err(error) => {
                    warn!(url = raw.as_str(), %error, "rejecting malformed url");
                    rejected += 1;
                }
            }
        }
        let receipt = EnqueueReceipt {
            accepted: accepted.len(),
            rejected,
        };

        let (orphaned, snapshot) = {
            let mut state = self.state.lock().await;

            let orphaned: Vec<HandleId> =
                state.active.values().filter_map(|task| task.handle).collect();
            for handle in &orphaned {
                state.closing.insert(*handle);
            }
            state.active.clear();

            let mut primary = VecDeque::with_capacity(accepted.len());
            for url in accepted {
                let id = state.allocate_task_id();
                primary.push_back(Task::new(id, url));
            }
            state.primary = primary;
            state.retry.clear();
            state.completed_count = 0;
            state.failed_count = 0;
            state.paused = false;
            state.pending_confirmation = None;
            state.epoch += 1;

            (orphaned, state.snapshot())
        };

        for handle in orphaned {
            if let Err(error) = self.launcher.close(handle).await {
                warn!(%handle, %error, "failed to close resource of replaced task");
            }
        }

        info!(
            accepted = receipt.accepted,
            rejected = receipt.rejected,
            "batch enqueued"
        );
        self.store.save(&snapshot).await?;
        self.schedule().await?;
        Ok(receipt)
    }

    /// Advance as much queued work as capacity allows.
    ///
    /// Re-entrant safe: overlapping invocations coalesce into one logical
    /// pass via the in-flight guard, and the guard is released atomically
    /// with the decision that nothing is left to do, so work enqueued during
    /// a pass is either picked up by it or by the next caller. The snapshot
    /// is persisted once per pass regardless of how many tasks started.
    pub async fn schedule(&self) -> Result<(), DroverError> {
        {
            let mut state = self.state.lock().await;
            if state.dispatching || state.paused {
                return Ok(());
            }
            state.dispatching = true;
        }

        loop {
            let popped = {
                let mut state = self.state.lock().await;
                if !state.paused
                    && state.has_capacity()
                    && let Some(task) = state.pop_next()
                {
                    state.reserved.insert(task.id);
                    Some((task, state.epoch))
                } else {
                    state.dispatching = false;
                    None
                }
            };
            let Some((task, epoch)) = popped else { break };
            self.start_task(task, epoch).await;
        }

        let snapshot = self.state.lock().await.snapshot();
        self.store.save(&snapshot).await
    }

    /// Launch one task, holding its concurrency slot as a reservation for
    /// the duration of the (fallible, asynchronous) open call.
    async fn start_task(&self, mut task: Task, epoch: u64) {
        debug!(task = %task.id, url = %task.url, "launching");
        let opened = self.launcher.open(&task.url).await;

        let stale_handle = {
            let mut state = self.state.lock().await;
            state.reserved.remove(&task.id);

            if state.epoch != epoch {
                // The batch was replaced while the launch was in flight; the
                // task no longer exists as far as the scheduler is concerned.
                match opened {
                    Ok(handle) => {
                        state.closing.insert(handle);
                        Some(handle)
                    }
                    Err(_) => None,
                }
            } else {
                match opened {
                    Ok(handle) => {
                        task.begin(handle, self.clock.now());
                        info!(task = %task.id, %handle, "task active");
                        state.active.insert(task.id, task);
                    }
                    Err(error) => {
                        warn!(task = %task.id, url = %task.url, %error, "launch failed");
                        let now = self.clock.now();
                        state.handle_failure(task, now, self.config.max_retries);
                    }
                }
                None
            }
        };

        if let Some(handle) = stale_handle
            && let Err(error) = self.launcher.close(handle).await
        {
            warn!(%handle, %error, "failed to close resource of stale launch");
        }
    }

    /// Route an external signal to the completion state machine.
    pub async fn deliver(&self, signal: Signal) -> Result<(), DroverError> {
        match signal {
            Signal::Done { handle } => self.on_done(handle).await,
            Signal::Destroyed { handle } => self.on_destroyed(handle).await,
        }
    }

    /// An explicit done signal attributable to `handle`.
    ///
    /// Matched by handle identity; a task is matched at most once, so a
    /// duplicate signal for an already-completed task is ignored.
    pub async fn on_done(&self, handle: HandleId) -> Result<(), DroverError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            let Some(id) = state.find_active_by_handle(handle) else {
                debug!(%handle, "done signal with no matching active task; ignoring");
                return Ok(());
            };
            let Some(mut task) = state.active.remove(&id) else {
                return Ok(());
            };
            task.absorb_elapsed(self.clock.now());
            state.completed_count += 1;
            state.closing.insert(handle);
            info!(task = %task.id, total_ms = task.total_time_ms, "task completed");
            state.snapshot()
        };

        if let Err(error) = self.launcher.close(handle).await {
            warn!(%handle, %error, "close after completion failed");
        }
        self.store.save(&snapshot).await?;
        self.schedule().await
    }

    /// The resource behind `handle` was destroyed without a prior done signal.
    ///
    /// Destructions the scheduler caused itself (marked via `closing` right
    /// before the `close()` call) are suppressed. A genuinely external close
    /// is ambiguous: with `auto_done_on_close` it counts as a completion,
    /// otherwise the scheduler pauses and records a pending confirmation
    /// instead of silently resolving it.
    pub async fn on_destroyed(&self, handle: HandleId) -> Result<(), DroverError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            if state.closing.remove(&handle) {
                debug!(%handle, "scheduler-initiated close; suppressed");
                return Ok(());
            }
            let Some(id) = state.find_active_by_handle(handle) else {
                debug!(%handle, "destroyed signal with no matching active task; ignoring");
                return Ok(());
            };
            let Some(mut task) = state.active.remove(&id) else {
                return Ok(());
            };
            let now = self.clock.now();

            if state.auto_done_on_close {
                task.absorb_elapsed(now);
                state.completed_count += 1;
                info!(task = %task.id, "external close counted as completion");
                state.snapshot()
            } else {
                task.release(now);
                warn!(
                    task = %task.id,
                    url = %task.url,
                    "resource destroyed without done signal; pausing for confirmation"
                );
                state.paused = true;
                let displaced = state
                    .pending_confirmation
                    .replace(PendingConfirmation { task });
                if let Some(previous) = displaced {
                    // Last-write-wins: the newer ambiguity is the one surfaced.
                    // The displaced task re-enters retry accounting so it is
                    // not silently lost.
                    state.handle_failure(previous.task, now, self.config.max_retries);
                }
                state.snapshot()
            }
        };

        self.store.save(&snapshot).await?;
        if !snapshot.paused {
            self.schedule().await?;
        }
        Ok(())
    }

    /// Resolve the pending confirmation for `task_id`.
    pub async fn confirm(&self, task_id: TaskId, decision: Decision) -> Result<(), DroverError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            match state.pending_confirmation.as_ref() {
                None => return Err(DroverError::NoPendingConfirmation),
                Some(pending) if pending.task.id != task_id => {
                    return Err(DroverError::ConfirmationMismatch(task_id));
                }
                Some(_) => {}
            }
            let Some(pending) = state.pending_confirmation.take() else {
                return Err(DroverError::NoPendingConfirmation);
            };

            match decision {
                Decision::Done => {
                    state.completed_count += 1;
                    state.paused = false;
                    info!(task = %task_id, "confirmed as done");
                }
                Decision::Reopen => {
                    // Relaunch ahead of other queued work; the dispatch pass
                    // below starts it under the normal capacity bound.
                    state.primary.push_front(pending.task);
                    state.paused = false;
                    info!(task = %task_id, "confirmed as reopen; relaunching");
                }
                Decision::Ignore => {
                    info!(task = %task_id, "confirmation ignored; scheduler stays paused");
                }
            }
            state.snapshot()
        };

        self.store.save(&snapshot).await?;
        if !snapshot.paused {
            self.schedule().await?;
        }
        Ok(())
    }

    /// Stop new dispatch. Already-active tasks are never preempted.
    pub async fn pause(&self) -> Result<(), DroverError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.paused = true;
            state.snapshot()
        };
        self.store.save(&snapshot).await
    }

    pub async fn resume(&self) -> Result<(), DroverError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.paused = false;
            state.snapshot()
        };
        self.store.save(&snapshot).await?;
        self.schedule().await
    }

    /// Drop all queued and active work, force-closing active resources.
    /// The paused flag is left as-is.
    pub async fn clear(&self) -> Result<(), DroverError> {
        let (orphaned, snapshot) = {
            let mut state = self.state.lock().await;
            let orphaned: Vec<HandleId> =
                state.active.values().filter_map(|task| task.handle).collect();
            for handle in &orphaned {
                state.closing.insert(*handle);
            }
            state.primary.clear();
            state.retry.clear();
            state.active.clear();
            state.pending_confirmation = None;
            state.completed_count = 0;
            state.failed_count = 0;
            state.epoch += 1;
            (orphaned, state.snapshot())
        };

        for handle in orphaned {
            if let Err(error) = self.launcher.close(handle).await {
                warn!(%handle, %error, "failed to close resource while clearing");
            }
        }
        info!("queue cleared");
        self.store.save(&snapshot).await
    }

    /// Set the concurrency limit, clamped to the configured cap.
    /// Returns the effective value. Shrinking never preempts active tasks.
    pub async fn set_concurrency(&self, requested: usize) -> Result<usize, DroverError> {
        let (effective, snapshot) = {
            let mut state = self.state.lock().await;
            state.max_concurrent = self.config.clamp_concurrency(requested);
            (state.max_concurrent, state.snapshot())
        };
        self.store.save(&snapshot).await?;
        self.schedule().await?;
        Ok(effective)
    }

    /// Set the policy for resources destroyed without a done signal.
    pub async fn set_auto_done_on_close(&self, enabled: bool) -> Result<(), DroverError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.auto_done_on_close = enabled;
            state.snapshot()
        };
        self.store.save(&snapshot).await
    }

    pub async fn status(&self) -> StatusReport {
        self.state.lock().await.status()
    }

    /// The pending confirmation, if any (task id and URL for display).
    pub async fn pending_confirmation(&self) -> Option<(TaskId, Url)> {
        let state = self.state.lock().await;
        state
            .pending_confirmation
            .as_ref()
            .map(|pending| (pending.task.id, pending.task.url.clone()))
    }
}
