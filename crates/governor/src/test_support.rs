//! Helpers shared by unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use crate::policy::{completed, completion, Continuation};
use crate::scheduler::Scheduler;
use crate::task::{Task, TaskId};

/// Ids of tasks whose continuation ran, in the order they started.
#[derive(Clone, Default)]
pub(crate) struct RunLog(Arc<Mutex<Vec<TaskId>>>);

impl RunLog {
    pub(crate) fn ids(&self) -> Vec<TaskId> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, id: TaskId) {
        self.0.lock().unwrap().push(id);
    }
}

/// Continuation that records the task id and resolves it right away.
pub(crate) fn instant(scheduler: &Scheduler, task: &Arc<Task>, log: &RunLog) -> Continuation {
    let (scheduler, task, log) = (scheduler.clone(), Arc::clone(task), log.clone());
    Continuation::new(move || {
        log.push(task.id());
        let outcome = Ok(json!(task.id()));
        scheduler.settle(&task, outcome.clone());
        completed(outcome)
    })
}

/// Continuation that records the task id and resolves it after `latency`.
pub(crate) fn delayed(
    scheduler: &Scheduler,
    task: &Arc<Task>,
    log: &RunLog,
    latency: Duration,
) -> Continuation {
    let (scheduler, task, log) = (scheduler.clone(), Arc::clone(task), log.clone());
    Continuation::new(move || {
        log.push(task.id());
        let done = completion(async move {
            tokio::time::sleep(latency).await;
            let outcome = Ok(json!(task.id()));
            scheduler.settle(&task, outcome.clone());
            outcome
        });
        tokio::spawn(done.clone());
        done
    })
}
