use serde_json::Value;

/// A unit of work flowing towards the executor.
///
/// Scheduled units carry the selector and parameters the dispatcher needs to
/// pick and drive a policy; plain units go straight to the executor.
#[derive(Debug, Clone)]
pub enum Unit<Op> {
    Scheduled(ScheduledUnit<Op>),
    Plain(Op),
}

#[derive(Debug, Clone)]
pub struct ScheduledUnit<Op> {
    /// Names the operation class, and with it the policy.
    pub selector: String,
    /// Ordered parameters policies derive grouping keys from.
    pub parameters: Vec<Value>,
    /// Opaque operation handed to the executor.
    pub inner: Op,
}

impl<Op> Unit<Op> {
    /// Tag an operation for scheduling under `selector`.
    pub fn scheduled(selector: impl Into<String>, parameters: Vec<Value>, inner: Op) -> Self {
        Self::Scheduled(ScheduledUnit {
            selector: selector.into(),
            parameters,
            inner,
        })
    }

    pub fn plain(inner: Op) -> Self {
        Self::Plain(inner)
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::Scheduled(unit) => Some(&unit.selector),
            Self::Plain(_) => None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled(_))
    }
}

impl<Op> From<ScheduledUnit<Op>> for Unit<Op> {
    fn from(unit: ScheduledUnit<Op>) -> Self {
        Self::Scheduled(unit)
    }
}
