use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TaskError;
use crate::sync::{lock, Signal};

/// Monotonic task identifier. Id order is submission order.
pub type TaskId = u64;

/// Result of running a task's work.
pub type Outcome = Result<Value, TaskError>;

/// Lifecycle state of a [`Task`]. Every state except `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

type SuccessCallback = Box<dyn FnOnce(&Value) + Send>;
type FailureCallback = Box<dyn FnOnce(&TaskError) + Send>;
type FulfilledCallback = Box<dyn FnOnce(bool) + Send>;

/// Callback lists drained by the single terminal transition.
#[derive(Default)]
pub(crate) struct Callbacks {
    on_success: Vec<SuccessCallback>,
    on_fail: Vec<FailureCallback>,
    on_fulfilled: Vec<FulfilledCallback>,
}

impl Callbacks {
    /// Success-or-failure callbacks first, then fulfilled with `cancelled = false`.
    pub(crate) fn fire_settled(self, outcome: &Outcome) {
        match outcome {
            Ok(value) => self.on_success.into_iter().for_each(|cb| cb(value)),
            Err(err) => self.on_fail.into_iter().for_each(|cb| cb(err)),
        }
        self.on_fulfilled.into_iter().for_each(|cb| cb(false));
    }

    /// Only fulfilled callbacks run for a cancellation.
    pub(crate) fn fire_cancelled(self) {
        self.on_fulfilled.into_iter().for_each(|cb| cb(true));
    }
}

struct TaskInner {
    state: TaskState,
    callbacks: Callbacks,
}

/// One submitted unit of work and its lifecycle.
///
/// Tasks are created by [`crate::Scheduler::new_task`] and only change state
/// through the scheduler's `resolve`, `reject` and `cancel`.
///
/// Callbacks registered after the task has settled are dropped without
/// running. Observers that may arrive late should await [`Task::settled`]
/// instead, which completes immediately for a terminal task.
pub struct Task {
    id: TaskId,
    selector: String,
    parameters: Vec<Value>,
    inner: Mutex<TaskInner>,
    settled: Signal,
}

impl Task {
    pub(crate) fn new(id: TaskId, selector: String, parameters: Vec<Value>) -> Self {
        Self {
            id,
            selector,
            parameters,
            inner: Mutex::new(TaskInner {
                state: TaskState::Pending,
                callbacks: Callbacks::default(),
            }),
            settled: Signal::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn parameter(&self, index: usize) -> Option<&Value> {
        self.parameters.get(index)
    }

    pub fn state(&self) -> TaskState {
        lock(&self.inner).state
    }

    pub fn is_pending(&self) -> bool {
        self.state() == TaskState::Pending
    }

    /// Run `callback` with the value if the task succeeds.
    pub fn on_success(&self, callback: impl FnOnce(&Value) + Send + 'static) {
        let mut inner = lock(&self.inner);
        if inner.state == TaskState::Pending {
            inner.callbacks.on_success.push(Box::new(callback));
        }
    }

    /// Run `callback` with the error if the task fails.
    pub fn on_fail(&self, callback: impl FnOnce(&TaskError) + Send + 'static) {
        let mut inner = lock(&self.inner);
        if inner.state == TaskState::Pending {
            inner.callbacks.on_fail.push(Box::new(callback));
        }
    }

    /// Run `callback` on any terminal transition; the flag is `true` for cancellation.
    pub fn on_fulfilled(&self, callback: impl FnOnce(bool) + Send + 'static) {
        let mut inner = lock(&self.inner);
        if inner.state == TaskState::Pending {
            inner.callbacks.on_fulfilled.push(Box::new(callback));
        }
    }

    /// Completes once the task reaches a terminal state.
    pub async fn settled(&self) {
        self.settled.wait().await
    }

    /// Perform the terminal transition. Returns the drained callbacks, or
    /// `None` if the task had already settled.
    pub(crate) fn transition(&self, next: TaskState) -> Option<Callbacks> {
        debug_assert!(next.is_terminal());
        let callbacks = {
            let mut inner = lock(&self.inner);
            if inner.state.is_terminal() {
                return None;
            }
            inner.state = next;
            std::mem::take(&mut inner.callbacks)
        };
        self.settled.fire();
        Some(callbacks)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("selector", &self.selector)
            .field("parameters", &self.parameters)
            .field("state", &self.state())
            .finish()
    }
}
