use std::sync::Arc;
use std::time::Duration;

use super::types::{GovernorConfig, PolicySpec};
use crate::dispatch::PolicyTable;
use crate::error::GovernorError;
use crate::policy::keys::{by_selector_and_parameter, same_key};
use crate::policy::{Composed, Debounce, Exclusive, Immediate, LeastCommits, PolicyRef};
use crate::task::Task;

/// Selector-scoped grouping key for a configured parameter index.
fn grouping(key: Option<usize>) -> impl Fn(&Task) -> String + Send + Sync + Clone + 'static {
    let by_parameter = key.map(by_selector_and_parameter);
    move |task| match &by_parameter {
        Some(key) => key(task),
        None => task.selector().to_string(),
    }
}

impl PolicySpec {
    /// Instantiate the described policy.
    pub fn build(&self) -> PolicyRef {
        match self {
            PolicySpec::Immediate => Arc::new(Immediate),
            PolicySpec::Debounce { delay_ms, key } => Arc::new(Debounce::new(
                grouping(*key),
                Duration::from_millis(*delay_ms),
            )),
            PolicySpec::Exclusive { key } => Arc::new(Exclusive::new(same_key(grouping(*key)))),
            PolicySpec::LeastCommits { key } => Arc::new(LeastCommits::new(grouping(*key))),
            PolicySpec::Composed { stages } => {
                Arc::new(Composed::new(stages.iter().map(PolicySpec::build).collect()))
            }
        }
    }
}

impl GovernorConfig {
    /// Validate and build the policy table for every configured selector.
    pub fn policy_table(&self) -> Result<PolicyTable, GovernorError> {
        self.validate()?;
        let mut table = PolicyTable::new();
        for (selector, spec) in &self.selectors {
            table.register(selector.clone(), spec.build())?;
        }
        Ok(table)
    }
}
