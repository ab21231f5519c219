use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::TaskError;
use crate::scheduler::Scheduler;
use crate::task::Task;

use super::{completion, Continuation, Policy, PolicyRef};

/// Chains policies: each stage's continuation enters the next stage, and the
/// last stage's continuation is the real execution.
///
/// The completion seen by every stage mirrors the real execution's outcome.
/// If a later stage drops the task without running it, earlier stages see
/// [`TaskError::Cancelled`].
pub struct Composed {
    stages: Arc<[PolicyRef]>,
}

impl Composed {
    pub fn new(stages: Vec<PolicyRef>) -> Self {
        Self {
            stages: stages.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Continuation entering stage `index`, ending in `last`.
fn chain(
    stages: Arc<[PolicyRef]>,
    index: usize,
    scheduler: Scheduler,
    task: Arc<Task>,
    last: Continuation,
) -> Continuation {
    if index >= stages.len() {
        return last;
    }
    Continuation::new(move || {
        let (tx, rx) = oneshot::channel();
        let inner = chain(
            Arc::clone(&stages),
            index + 1,
            scheduler.clone(),
            Arc::clone(&task),
            last,
        );
        let forward = Continuation::new(move || {
            let done = inner.run();
            let _ = tx.send(done.clone());
            done
        });
        stages[index].process(&scheduler, &task, forward);
        completion(async move {
            match rx.await {
                Ok(done) => done.await,
                Err(_) => Err(TaskError::Cancelled),
            }
        })
    })
}

impl Policy for Composed {
    fn process(&self, scheduler: &Scheduler, task: &Arc<Task>, next: Continuation) {
        let Some(first) = self.stages.first() else {
            let _ = next.run();
            return;
        };
        let rest = chain(
            Arc::clone(&self.stages),
            1,
            scheduler.clone(),
            Arc::clone(task),
            next,
        );
        first.process(scheduler, task, rest);
    }
}
