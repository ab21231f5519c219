//! Task and lock registry shared by every policy of one dispatch pipeline.
//!
//! The [`Scheduler`] owns the set of live tasks and active locks and hands out
//! the primitives policies are built from:
//! - `core`: task creation, terminal transitions and queries
//! - `locks`: predicate locks and the `wait_on_lock` / `wait` suspension points
//! - `metrics`: outcome counters

mod core;
mod locks;
pub mod metrics;

pub use self::core::Scheduler;
pub use self::locks::{LockPredicate, Unlock};
pub use self::metrics::SchedulerStats;
