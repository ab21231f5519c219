use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::task::{Outcome, Task, TaskId};

/// Caller-visible result of one dispatch.
///
/// Built only from the task's success and failure signals: under the
/// default [`super::CancellationMode::Silent`] a task cancelled by its policy
/// yields a submission that never completes. Use
/// [`super::CancellationMode::Reject`] to receive `TaskError::Cancelled`
/// instead.
pub struct Submission {
    task: Option<Arc<Task>>,
    receiver: Option<oneshot::Receiver<Outcome>>,
}

impl Submission {
    pub(crate) fn new(task: Option<Arc<Task>>, receiver: oneshot::Receiver<Outcome>) -> Self {
        Self {
            task,
            receiver: Some(receiver),
        }
    }

    /// The scheduled task behind this submission; `None` for plain units.
    pub fn task(&self) -> Option<&Arc<Task>> {
        self.task.as_ref()
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.task.as_ref().map(|t| t.id())
    }
}

impl Future for Submission {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Poll::Pending;
        };
        match Pin::new(receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => {
                self.receiver = None;
                Poll::Ready(outcome)
            }
            // Sender gone without an outcome: cancelled, stays pending for good.
            Poll::Ready(Err(_)) => {
                self.receiver = None;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
