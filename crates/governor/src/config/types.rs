use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dispatch::CancellationMode;

// ── Top-level config ────────────────────────────────────────────────

/// Policy configuration for one dispatch pipeline.
///
/// Parsed from `governor.toml` with support for environment variable overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// What callers see when a policy cancels their task.
    #[serde(default)]
    pub cancellation: CancellationMode,

    /// Policy per selector. Selectors not listed run immediately.
    #[serde(default)]
    pub selectors: BTreeMap<String, PolicySpec>,
}

// ── Policy specs ────────────────────────────────────────────────────

/// Serializable description of a policy.
///
/// `key` is the index of the parameter used as grouping key. Keys are always
/// scoped to the selector; an omitted `key` groups every task of the
/// selector together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PolicySpec {
    Immediate,
    Debounce {
        delay_ms: u64,
        #[serde(default)]
        key: Option<usize>,
    },
    Exclusive {
        #[serde(default)]
        key: Option<usize>,
    },
    LeastCommits {
        #[serde(default)]
        key: Option<usize>,
    },
    Composed {
        stages: Vec<PolicySpec>,
    },
}

impl PolicySpec {
    /// Short name as used in the `policy` field.
    pub fn kind(&self) -> &'static str {
        match self {
            PolicySpec::Immediate => "immediate",
            PolicySpec::Debounce { .. } => "debounce",
            PolicySpec::Exclusive { .. } => "exclusive",
            PolicySpec::LeastCommits { .. } => "least_commits",
            PolicySpec::Composed { .. } => "composed",
        }
    }
}
