//! Interception of units of work and routing through per-selector policies.

mod dispatcher;
mod executor;
mod submission;
mod table;
#[cfg(test)]
mod tests;
mod unit;

use serde::{Deserialize, Serialize};

pub use dispatcher::Dispatcher;
pub use executor::{Execution, Executor};
pub use submission::Submission;
pub use table::PolicyTable;
pub use unit::{ScheduledUnit, Unit};

/// What a caller sees when its task is cancelled by a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancellationMode {
    /// The submission never completes.
    #[default]
    Silent,
    /// The submission completes with `TaskError::Cancelled`.
    Reject,
}
