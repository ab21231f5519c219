use std::sync::Arc;

use tracing::debug;

use crate::scheduler::Scheduler;
use crate::task::Task;

use super::{Continuation, Policy};

type Excludes = Arc<dyn Fn(&Task, &Task) -> bool + Send + Sync>;

/// Mutual exclusion between conflicting tasks, in submission order.
///
/// `excludes(other, current)` decides whether `other` conflicts with
/// `current`. A task holds back every later conflicting task with a lock,
/// waits for all earlier conflicting tasks to settle, runs, and releases its
/// lock once its outcome is known.
pub struct Exclusive {
    excludes: Excludes,
}

impl Exclusive {
    pub fn new(excludes: impl Fn(&Task, &Task) -> bool + Send + Sync + 'static) -> Self {
        Self {
            excludes: Arc::new(excludes),
        }
    }
}

impl Policy for Exclusive {
    fn process(&self, scheduler: &Scheduler, task: &Arc<Task>, next: Continuation) {
        let unlock = {
            let excludes = Arc::clone(&self.excludes);
            let current = Arc::clone(task);
            scheduler.lock(move |later| later.id() > current.id() && excludes(later, &current))
        };
        let lock_wait = scheduler.wait_on_lock(task);

        let scheduler = scheduler.clone();
        let task = Arc::clone(task);
        let excludes = Arc::clone(&self.excludes);
        tokio::spawn(async move {
            lock_wait.await;
            scheduler
                .wait(|earlier| earlier.id() < task.id() && excludes(earlier, &task))
                .await;
            debug!(task_id = task.id(), "exclusive task cleared to run");
            let outcome = next.run().await;
            debug!(task_id = task.id(), ok = outcome.is_ok(), "exclusive task finished");
            unlock.release();
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::policy::keys::{by_parameter, same_key};
    use crate::task::TaskState;
    use crate::test_support::{delayed, RunLog};

    #[tokio::test(start_paused = true)]
    async fn conflicting_tasks_run_one_at_a_time_in_order() {
        let scheduler = Scheduler::new();
        let policy = Exclusive::new(same_key(by_parameter(0)));
        let log = RunLog::default();
        let latency = Duration::from_millis(30);

        let x = scheduler.new_task("write_preset", vec![json!(1)]);
        policy.process(&scheduler, &x, delayed(&scheduler, &x, &log, latency));
        let y = scheduler.new_task("write_preset", vec![json!(1)]);
        policy.process(&scheduler, &y, delayed(&scheduler, &y, &log, latency));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(log.ids(), vec![x.id()]);
        assert_eq!(y.state(), TaskState::Pending);

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(x.state(), TaskState::Succeeded);
        assert_eq!(log.ids(), vec![x.id(), y.id()]);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(y.state(), TaskState::Succeeded);
        assert_eq!(scheduler.lock_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_tasks_do_not_wait() {
        let scheduler = Scheduler::new();
        let policy = Exclusive::new(same_key(by_parameter(0)));
        let log = RunLog::default();
        let latency = Duration::from_millis(30);

        let x = scheduler.new_task("write_preset", vec![json!(1)]);
        policy.process(&scheduler, &x, delayed(&scheduler, &x, &log, latency));
        let y = scheduler.new_task("write_preset", vec![json!(2)]);
        policy.process(&scheduler, &y, delayed(&scheduler, &y, &log, latency));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(log.ids(), vec![x.id(), y.id()]);
    }

    #[tokio::test(start_paused = true)]
    async fn lock_released_after_failure() {
        let scheduler = Scheduler::new();
        let policy = Exclusive::new(|_: &Task, _: &Task| true);

        let x = scheduler.new_task("write_preset", vec![]);
        let failing = {
            let (scheduler, task) = (scheduler.clone(), Arc::clone(&x));
            Continuation::new(move || {
                let outcome = Err(crate::error::TaskError::failed("bus fault"));
                scheduler.settle(&task, outcome.clone());
                crate::policy::completed(outcome)
            })
        };
        policy.process(&scheduler, &x, failing);
        assert_eq!(scheduler.lock_count(), 1);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(x.state(), TaskState::Failed);
        assert_eq!(scheduler.lock_count(), 0);
    }
}
