use std::path::Path;

use tracing::{info, warn};

use super::types::GovernorConfig;
use crate::dispatch::CancellationMode;
use crate::error::GovernorError;

impl GovernorConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, GovernorError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GovernorError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Log a one-line summary per configured selector.
    pub fn log_summary(&self) {
        info!(
            cancellation = ?self.cancellation,
            selectors = self.selectors.len(),
            "governor config"
        );
        for (selector, spec) in &self.selectors {
            info!(selector = %selector, policy = spec.kind(), "  selector policy");
        }
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// - `GOVERNOR_CANCELLATION` -> `cancellation` (`silent` or `reject`)
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GOVERNOR_CANCELLATION") {
            match parse_cancellation(&v) {
                Some(mode) => self.cancellation = mode,
                None => warn!(value = %v, "ignoring invalid GOVERNOR_CANCELLATION"),
            }
        }
    }
}

pub(crate) fn parse_cancellation(value: &str) -> Option<CancellationMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "silent" => Some(CancellationMode::Silent),
        "reject" => Some(CancellationMode::Reject),
        _ => None,
    }
}
