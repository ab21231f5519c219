//! Concurrency governance for command pipelines.
//!
//! Units of work tagged with a selector and parameters become [`Task`]s in a
//! shared [`Scheduler`] and are routed through the [`policy`] configured for
//! their selector before reaching the [`Executor`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod policy;
pub mod scheduler;
pub(crate) mod sync;
pub mod task;
#[cfg(test)]
mod test_support;

pub use config::{GovernorConfig, PolicySpec};
pub use dispatch::{
    CancellationMode, Dispatcher, Execution, Executor, PolicyTable, ScheduledUnit, Submission,
    Unit,
};
pub use error::{GovernorError, TaskError};
pub use policy::{
    Composed, Cond, Continuation, Debounce, Exclusive, Immediate, LeastCommits, Policy, PolicyRef,
};
pub use scheduler::{Scheduler, SchedulerStats, Unlock};
pub use task::{Outcome, Task, TaskId, TaskState};
