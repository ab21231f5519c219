use serde::Serialize;

use crate::task::TaskState;

/// Scheduler operational counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Tasks handed out by `new_task`.
    pub tasks_created: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub tasks_cancelled: u64,
    /// Locks registered over the scheduler's lifetime.
    pub locks_acquired: u64,
}

impl SchedulerStats {
    /// Record a terminal transition.
    pub fn record_settled(&mut self, state: TaskState) {
        match state {
            TaskState::Succeeded => self.tasks_succeeded += 1,
            TaskState::Failed => self.tasks_failed += 1,
            TaskState::Cancelled => self.tasks_cancelled += 1,
            TaskState::Pending => {}
        }
    }

    /// Tasks that have not reached a terminal state yet.
    pub fn tasks_pending(&self) -> u64 {
        self.tasks_created
            .saturating_sub(self.tasks_succeeded + self.tasks_failed + self.tasks_cancelled)
    }
}
