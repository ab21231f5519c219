use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::config::GovernorConfig;
use crate::error::{GovernorError, TaskError};
use crate::policy::{completed, completion, Continuation};
use crate::scheduler::Scheduler;
use crate::sync::lock;
use crate::task::{Outcome, Task};

use super::executor::{execute_guarded, settle_execution, Execution, Executor};
use super::submission::Submission;
use super::table::PolicyTable;
use super::unit::{ScheduledUnit, Unit};
use super::CancellationMode;

/// Interception stage in front of an executor.
///
/// Owns the pipeline's single [`Scheduler`]. Scheduled units are routed
/// through the policy configured for their selector; plain units go straight
/// to the executor.
pub struct Dispatcher<Op> {
    scheduler: Scheduler,
    policies: PolicyTable,
    executor: Arc<dyn Executor<Op>>,
    cancellation: CancellationMode,
}

impl<Op: Send + 'static> Dispatcher<Op> {
    /// Install `policies` in front of `executor` with a fresh scheduler.
    pub fn install(policies: PolicyTable, executor: impl Executor<Op>) -> Self {
        info!(
            selectors = ?policies.selectors(),
            "dispatcher installed"
        );
        Self {
            scheduler: Scheduler::new(),
            policies,
            executor: Arc::new(executor),
            cancellation: CancellationMode::default(),
        }
    }

    /// Install the policies described by `config`, honoring its cancellation mode.
    pub fn from_config(
        config: &GovernorConfig,
        executor: impl Executor<Op>,
    ) -> Result<Self, GovernorError> {
        let policies = config.policy_table()?;
        Ok(Self::install(policies, executor).with_cancellation(config.cancellation))
    }

    pub fn with_cancellation(mut self, mode: CancellationMode) -> Self {
        self.cancellation = mode;
        self
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn cancellation(&self) -> CancellationMode {
        self.cancellation
    }

    /// Shorthand for dispatching [`Unit::scheduled`].
    pub fn submit(&self, selector: impl Into<String>, parameters: Vec<Value>, inner: Op) -> Submission {
        self.dispatch(Unit::scheduled(selector, parameters, inner))
    }

    pub fn dispatch(&self, unit: Unit<Op>) -> Submission {
        match unit {
            Unit::Scheduled(unit) => self.dispatch_scheduled(unit),
            Unit::Plain(op) => self.dispatch_plain(op),
        }
    }

    #[instrument(level = "debug", skip_all, fields(selector = %unit.selector))]
    fn dispatch_scheduled(&self, unit: ScheduledUnit<Op>) -> Submission {
        let ScheduledUnit {
            selector,
            parameters,
            inner,
        } = unit;
        let policy = self.policies.resolve(&selector);
        let task = self.scheduler.new_task(selector, parameters);

        // Observe the outcome before the policy runs: an immediate policy
        // settles the task before `process` returns.
        let receiver = self.observe(&task);
        let next = self.execution(Arc::clone(&task), inner);
        policy.process(&self.scheduler, &task, next);

        Submission::new(Some(task), receiver)
    }

    fn dispatch_plain(&self, op: Op) -> Submission {
        let (tx, rx) = oneshot::channel();
        match execute_guarded(self.executor.as_ref(), op) {
            Execution::Ready(outcome) => {
                let _ = tx.send(outcome);
            }
            deferred => {
                tokio::spawn(async move {
                    let _ = tx.send(settle_execution(deferred).await);
                });
            }
        }
        Submission::new(None, rx)
    }

    fn observe(&self, task: &Task) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));

        {
            let slot = Arc::clone(&slot);
            task.on_success(move |value| deliver(&slot, Ok(value.clone())));
        }
        {
            let slot = Arc::clone(&slot);
            task.on_fail(move |error| deliver(&slot, Err(error.clone())));
        }
        if self.cancellation == CancellationMode::Reject {
            task.on_fulfilled(move |cancelled| {
                if cancelled {
                    deliver(&slot, Err(TaskError::Cancelled));
                }
            });
        }
        rx
    }

    /// The real execution: run the operation, settle the task with the
    /// outcome, and hand back a completion mirroring it.
    fn execution(&self, task: Arc<Task>, op: Op) -> Continuation {
        let scheduler = self.scheduler.clone();
        let executor = Arc::clone(&self.executor);
        Continuation::new(move || {
            if !task.is_pending() {
                debug!(task_id = task.id(), state = ?task.state(), "skipping settled task");
                return completed(Err(TaskError::Cancelled));
            }
            debug!(task_id = task.id(), selector = task.selector(), "executing task");
            match execute_guarded(executor.as_ref(), op) {
                Execution::Ready(outcome) => {
                    record(&scheduler, &task, &outcome);
                    completed(outcome)
                }
                deferred => {
                    let done = completion(async move {
                        let outcome = settle_execution(deferred).await;
                        record(&scheduler, &task, &outcome);
                        outcome
                    });
                    tokio::spawn(done.clone());
                    done
                }
            }
        })
    }
}

fn record(scheduler: &Scheduler, task: &Task, outcome: &Outcome) {
    if let Err(error) = outcome {
        warn!(task_id = task.id(), selector = task.selector(), %error, "task failed");
    }
    scheduler.settle(task, outcome.clone());
}

fn deliver(slot: &Mutex<Option<oneshot::Sender<Outcome>>>, outcome: Outcome) {
    if let Some(tx) = lock(slot).take() {
        let _ = tx.send(outcome);
    }
}
