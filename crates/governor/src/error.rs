use thiserror::Error;

/// Failure outcome of a scheduled task.
///
/// Cloneable because a single outcome fans out to every continuation
/// observing it (see [`crate::policy::Completion`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("execution failed: {0}")]
    Failed(String),

    #[error("execution panicked: {0}")]
    Panicked(String),

    /// The task was superseded or dropped by its policy before it ran.
    #[error("task cancelled before execution")]
    Cancelled,
}

impl TaskError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Errors raised while building a dispatcher from configuration.
#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("selector '{0}' is already registered")]
    DuplicateSelector(String),
}
