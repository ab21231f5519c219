use std::sync::Arc;

use crate::scheduler::Scheduler;
use crate::task::Task;

use super::{Continuation, Immediate, Policy, PolicyRef};

type Predicate = Box<dyn Fn(&Task) -> bool + Send + Sync>;

/// Delegates to the first branch whose predicate matches the task, or runs
/// the task immediately when none does.
#[derive(Default)]
pub struct Cond {
    branches: Vec<(Predicate, PolicyRef)>,
}

impl Cond {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a branch. Branches are tried in insertion order.
    pub fn when(
        mut self,
        predicate: impl Fn(&Task) -> bool + Send + Sync + 'static,
        policy: impl Policy + 'static,
    ) -> Self {
        self.branches.push((Box::new(predicate), Arc::new(policy)));
        self
    }

    pub fn when_ref(
        mut self,
        predicate: impl Fn(&Task) -> bool + Send + Sync + 'static,
        policy: PolicyRef,
    ) -> Self {
        self.branches.push((Box::new(predicate), policy));
        self
    }
}

impl Policy for Cond {
    fn process(&self, scheduler: &Scheduler, task: &Arc<Task>, next: Continuation) {
        match self.branches.iter().find(|(predicate, _)| predicate(task)) {
            Some((_, policy)) => policy.process(scheduler, task, next),
            None => Immediate.process(scheduler, task, next),
        }
    }
}
