use std::collections::HashMap;
use std::sync::Arc;

use crate::error::GovernorError;
use crate::policy::{Immediate, Policy, PolicyRef};

/// Static `selector -> policy` configuration.
/// Selectors without an entry run immediately.
#[derive(Clone, Default)]
pub struct PolicyTable {
    policies: HashMap<String, PolicyRef>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration. A later entry for the same selector wins.
    pub fn with(mut self, selector: impl Into<String>, policy: impl Policy + 'static) -> Self {
        self.policies.insert(selector.into(), Arc::new(policy));
        self
    }

    /// Register a policy. Returns error if the selector is already registered.
    pub fn register(
        &mut self,
        selector: impl Into<String>,
        policy: PolicyRef,
    ) -> Result<(), GovernorError> {
        let selector = selector.into();
        if self.policies.contains_key(&selector) {
            return Err(GovernorError::DuplicateSelector(selector));
        }
        self.policies.insert(selector, policy);
        Ok(())
    }

    /// Look up the policy for a selector, defaulting to [`Immediate`].
    pub fn resolve(&self, selector: &str) -> PolicyRef {
        self.policies
            .get(selector)
            .cloned()
            .unwrap_or_else(|| Arc::new(Immediate))
    }

    pub fn contains(&self, selector: &str) -> bool {
        self.policies.contains_key(selector)
    }

    /// Configured selectors, sorted.
    pub fn selectors(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
