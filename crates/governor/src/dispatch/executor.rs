use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::warn;

use crate::error::TaskError;
use crate::task::Outcome;

/// What an [`Executor`] hands back for one operation: an outcome that is
/// already known, or a future that produces it.
pub enum Execution {
    Ready(Outcome),
    Deferred(BoxFuture<'static, Outcome>),
}

impl Execution {
    pub fn value(value: Value) -> Self {
        Self::Ready(Ok(value))
    }

    pub fn error(error: TaskError) -> Self {
        Self::Ready(Err(error))
    }

    pub fn deferred(future: impl Future<Output = Outcome> + Send + 'static) -> Self {
        Self::Deferred(future.boxed())
    }
}

impl From<Outcome> for Execution {
    fn from(outcome: Outcome) -> Self {
        Self::Ready(outcome)
    }
}

/// The rest of the pipeline: performs an opaque operation (a device write,
/// an IPC call) and reports its outcome.
pub trait Executor<Op>: Send + Sync + 'static {
    fn execute(&self, op: Op) -> Execution;
}

impl<Op, F> Executor<Op> for F
where
    F: Fn(Op) -> Execution + Send + Sync + 'static,
{
    fn execute(&self, op: Op) -> Execution {
        self(op)
    }
}

/// Call the executor, turning a panic in its synchronous part into a failure.
pub(crate) fn execute_guarded<Op: 'static>(executor: &dyn Executor<Op>, op: Op) -> Execution {
    match catch_unwind(AssertUnwindSafe(|| executor.execute(op))) {
        Ok(execution) => execution,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(%message, "executor panicked");
            Execution::error(TaskError::Panicked(message))
        }
    }
}

/// Drive an execution to its outcome, catching panics in deferred work too.
pub(crate) async fn settle_execution(execution: Execution) -> Outcome {
    match execution {
        Execution::Ready(outcome) => outcome,
        Execution::Deferred(future) => match AssertUnwindSafe(future).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(%message, "deferred execution panicked");
                Err(TaskError::Panicked(message))
            }
        },
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
