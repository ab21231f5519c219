use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use crate::error::TaskError;
use crate::scheduler::locks::LockEntry;
use crate::scheduler::metrics::SchedulerStats;
use crate::sync::lock;
use crate::task::{Callbacks, Outcome, Task, TaskId, TaskState};

pub(crate) struct SchedulerInner {
    pub(crate) next_task_id: AtomicU64,
    pub(crate) next_lock_id: AtomicU64,
    /// Live tasks keyed by id, so snapshots come out in submission order.
    pub(crate) tasks: Mutex<BTreeMap<TaskId, Arc<Task>>>,
    pub(crate) locks: Mutex<Vec<LockEntry>>,
    pub(crate) stats: Mutex<SchedulerStats>,
}

/// Registry of live tasks and active locks.
///
/// Cheap to clone: clones share the same registry. Create one per dispatch
/// pipeline and pass it to policies explicitly.
#[derive(Clone)]
pub struct Scheduler {
    pub(crate) inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                next_task_id: AtomicU64::new(1),
                next_lock_id: AtomicU64::new(1),
                tasks: Mutex::new(BTreeMap::new()),
                locks: Mutex::new(Vec::new()),
                stats: Mutex::new(SchedulerStats::default()),
            }),
        }
    }

    /// Allocate the next id and register a new pending task as live.
    pub fn new_task(&self, selector: impl Into<String>, parameters: Vec<Value>) -> Arc<Task> {
        let id = self.inner.next_task_id.fetch_add(1, Ordering::SeqCst);
        let task = Arc::new(Task::new(id, selector.into(), parameters));
        lock(&self.inner.tasks).insert(id, Arc::clone(&task));
        lock(&self.inner.stats).tasks_created += 1;
        debug!(task_id = id, selector = task.selector(), "task created");
        task
    }

    /// Settle `task` successfully. No-op if it has already settled.
    pub fn resolve(&self, task: &Task, value: Value) {
        self.settle(task, Ok(value));
    }

    /// Settle `task` as failed. No-op if it has already settled.
    pub fn reject(&self, task: &Task, reason: TaskError) {
        self.settle(task, Err(reason));
    }

    /// Settle `task` with an execution outcome.
    pub fn settle(&self, task: &Task, outcome: Outcome) {
        let state = if outcome.is_ok() {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        };
        let Some(callbacks) = self.finish(task, state) else {
            return;
        };
        callbacks.fire_settled(&outcome);
    }

    /// Cancel `task`. Only its fulfilled callbacks run, with `cancelled = true`.
    pub fn cancel(&self, task: &Task) {
        if let Some(callbacks) = self.finish(task, TaskState::Cancelled) {
            callbacks.fire_cancelled();
        }
    }

    /// Terminal transition plus removal from the live set, both under the
    /// registry lock so no query sees a settled task. Callbacks are
    /// returned so they run without any registry lock held.
    fn finish(&self, task: &Task, state: TaskState) -> Option<Callbacks> {
        let callbacks = {
            let mut tasks = lock(&self.inner.tasks);
            let callbacks = task.transition(state);
            if callbacks.is_some() {
                tasks.remove(&task.id());
            }
            callbacks
        };
        let Some(callbacks) = callbacks else {
            debug!(task_id = task.id(), ?state, "ignoring transition of settled task");
            return None;
        };
        lock(&self.inner.stats).record_settled(state);
        debug!(task_id = task.id(), selector = task.selector(), ?state, "task settled");
        Some(callbacks)
    }

    /// Snapshot of live tasks matching `predicate`, in id order.
    pub fn query(&self, predicate: impl Fn(&Task) -> bool) -> Vec<Arc<Task>> {
        let live: Vec<Arc<Task>> = lock(&self.inner.tasks).values().cloned().collect();
        live.into_iter().filter(|t| predicate(t)).collect()
    }

    /// Number of tasks that have not settled yet.
    pub fn live_count(&self) -> usize {
        lock(&self.inner.tasks).len()
    }

    /// Number of locks currently held.
    pub fn lock_count(&self) -> usize {
        lock(&self.inner.locks).len()
    }

    /// Snapshot of the outcome counters.
    pub fn stats(&self) -> SchedulerStats {
        lock(&self.inner.stats).clone()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
