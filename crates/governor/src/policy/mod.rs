//! Composable concurrency policies.
//!
//! A policy receives the pipeline's [`Scheduler`], the freshly created task
//! and a [`Continuation`]. It decides whether and when to run the
//! continuation, or cancels the task without ever running it.
//!
//! [`Debounce`], [`Exclusive`] and [`LeastCommits`] suspend on timers or
//! scheduler waits by spawning onto the current tokio runtime.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::scheduler::Scheduler;
use crate::task::{Outcome, Task};

mod composed;
mod cond;
mod debounce;
mod exclusive;
mod immediate;
pub mod keys;
mod least_commits;

pub use composed::Composed;
pub use cond::Cond;
pub use debounce::Debounce;
pub use exclusive::Exclusive;
pub use immediate::Immediate;
pub use least_commits::LeastCommits;

/// Future of a task's execution outcome. Cloneable so several stages can
/// observe the same execution.
pub type Completion = Shared<BoxFuture<'static, Outcome>>;

/// A completion that is already settled.
pub fn completed(outcome: Outcome) -> Completion {
    futures::future::ready(outcome).boxed().shared()
}

/// Wrap any outcome future as a [`Completion`].
pub fn completion(future: impl std::future::Future<Output = Outcome> + Send + 'static) -> Completion {
    future.boxed().shared()
}

/// The rest of the pipeline for one task. Running it hands the task's work
/// to the executor (possibly through further policy stages).
pub struct Continuation {
    run: Box<dyn FnOnce() -> Completion + Send>,
}

impl Continuation {
    pub fn new(run: impl FnOnce() -> Completion + Send + 'static) -> Self {
        Self { run: Box::new(run) }
    }

    pub fn run(self) -> Completion {
        (self.run)()
    }
}

/// One concurrency strategy.
pub trait Policy: Send + Sync {
    fn process(&self, scheduler: &Scheduler, task: &Arc<Task>, next: Continuation);
}

impl<F> Policy for F
where
    F: Fn(&Scheduler, &Arc<Task>, Continuation) + Send + Sync,
{
    fn process(&self, scheduler: &Scheduler, task: &Arc<Task>, next: Continuation) {
        self(scheduler, task, next)
    }
}

/// Shared handle to a policy, as stored in policy tables and combinators.
pub type PolicyRef = Arc<dyn Policy>;
