use super::types::{GovernorConfig, PolicySpec};
use crate::error::GovernorError;

impl GovernorConfig {
    /// Validate every selector's policy spec.
    pub fn validate(&self) -> Result<(), GovernorError> {
        for (selector, spec) in &self.selectors {
            if selector.trim().is_empty() {
                return Err(GovernorError::Config("empty selector name".into()));
            }
            validate_spec(selector, spec)?;
        }
        Ok(())
    }
}

fn validate_spec(selector: &str, spec: &PolicySpec) -> Result<(), GovernorError> {
    match spec {
        PolicySpec::Debounce { delay_ms: 0, .. } => Err(GovernorError::Config(format!(
            "selector '{selector}': debounce delay_ms must be greater than zero"
        ))),
        PolicySpec::Composed { stages } if stages.is_empty() => Err(GovernorError::Config(
            format!("selector '{selector}': composed policy needs at least one stage"),
        )),
        PolicySpec::Composed { stages } => stages
            .iter()
            .try_for_each(|stage| validate_spec(selector, stage)),
        _ => Ok(()),
    }
}
