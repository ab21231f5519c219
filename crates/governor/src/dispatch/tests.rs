use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::{json, Value};

use super::{CancellationMode, Dispatcher, Execution, PolicyTable, Unit};
use crate::error::TaskError;
use crate::policy::keys::{by_parameter, same_key};
use crate::policy::{Continuation, Debounce, Exclusive};
use crate::scheduler::Scheduler;
use crate::task::{Task, TaskState};

/// Executor echoing its operation back, counting calls.
fn echo(calls: &Arc<AtomicUsize>) -> impl Fn(Value) -> Execution + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move |op| {
        calls.fetch_add(1, Ordering::SeqCst);
        Execution::value(op)
    }
}

#[test]
fn unconfigured_selector_executes_synchronously() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = Dispatcher::install(PolicyTable::new(), echo(&calls));

    let submission = dispatcher.submit("set_gain", vec![json!(1)], json!(0.75));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let task = submission.task().cloned().unwrap();
    assert_eq!(task.state(), TaskState::Succeeded);
    assert_eq!(submission.now_or_never(), Some(Ok(json!(0.75))));
    assert_eq!(dispatcher.scheduler().live_count(), 0);
}

#[test]
fn plain_units_bypass_the_scheduler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = Dispatcher::install(PolicyTable::new(), echo(&calls));

    let submission = dispatcher.dispatch(Unit::plain(json!("ping")));
    assert!(submission.task().is_none());
    assert_eq!(submission.now_or_never(), Some(Ok(json!("ping"))));
    assert_eq!(dispatcher.scheduler().stats().tasks_created, 0);
}

#[test]
fn execution_errors_reject_the_submission() {
    let dispatcher = Dispatcher::install(PolicyTable::new(), |_: ()| {
        Execution::error(TaskError::failed("controller busy"))
    });

    let submission = dispatcher.submit("store_preset", vec![], ());
    let task = submission.task().cloned().unwrap();
    assert_eq!(
        submission.now_or_never(),
        Some(Err(TaskError::Failed("controller busy".into())))
    );
    assert_eq!(task.state(), TaskState::Failed);
}

#[test]
fn executor_panic_becomes_task_failure() {
    let dispatcher = Dispatcher::install(PolicyTable::new(), |_: ()| -> Execution {
        panic!("bad register")
    });

    let submission = dispatcher.submit("store_preset", vec![], ());
    assert_eq!(
        submission.now_or_never(),
        Some(Err(TaskError::Panicked("bad register".into())))
    );
    assert_eq!(dispatcher.scheduler().stats().tasks_failed, 1);
}

#[tokio::test]
async fn deferred_execution_settles_later() {
    let dispatcher = Dispatcher::install(PolicyTable::new(), |op: u64| {
        Execution::deferred(async move {
            tokio::task::yield_now().await;
            Ok(json!(op + 1))
        })
    });

    let submission = dispatcher.submit("read_meter", vec![json!(3)], 41);
    let task = submission.task().cloned().unwrap();
    assert_eq!(task.state(), TaskState::Pending);

    assert_eq!(submission.await, Ok(json!(42)));
    assert_eq!(task.state(), TaskState::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn cancelled_submission_never_settles_by_default() {
    let calls = Arc::new(AtomicUsize::new(0));
    let policies = PolicyTable::new().with(
        "set_gain",
        Debounce::new(by_parameter(0), Duration::from_millis(50)),
    );
    let dispatcher = Dispatcher::install(policies, echo(&calls));

    let first = dispatcher.submit("set_gain", vec![json!(1)], json!(0.1));
    let second = dispatcher.submit("set_gain", vec![json!(1)], json!(0.2));

    assert_eq!(second.await, Ok(json!(0.2)));
    assert_eq!(first.task().unwrap().state(), TaskState::Cancelled);
    assert!(tokio::time::timeout(Duration::from_secs(10), first).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn reject_mode_surfaces_cancellation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let policies = PolicyTable::new().with(
        "set_gain",
        Debounce::new(by_parameter(0), Duration::from_millis(50)),
    );
    let dispatcher =
        Dispatcher::install(policies, echo(&calls)).with_cancellation(CancellationMode::Reject);

    let first = dispatcher.submit("set_gain", vec![json!(1)], json!(0.1));
    let _second = dispatcher.submit("set_gain", vec![json!(1)], json!(0.2));

    assert_eq!(first.await, Err(TaskError::Cancelled));
}

#[test]
fn continuation_of_cancelled_task_skips_execution() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cancel_then_run = |scheduler: &Scheduler, task: &Arc<Task>, next: Continuation| {
        scheduler.cancel(task);
        let _ = next.run();
    };
    let policies = PolicyTable::new().with("set_gain", cancel_then_run);
    let dispatcher = Dispatcher::install(policies, echo(&calls));

    let submission = dispatcher.submit("set_gain", vec![json!(1)], json!(0.5));
    assert_eq!(submission.task().unwrap().state(), TaskState::Cancelled);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(dispatcher.scheduler().stats().tasks_cancelled, 1);
}

#[tokio::test(start_paused = true)]
async fn exclusive_lock_released_after_executor_panic() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let policies = PolicyTable::new().with(
        "write_preset",
        Exclusive::new(same_key(by_parameter(0))),
    );
    let dispatcher = Dispatcher::install(policies, move |op: u64| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("flash write fault");
        }
        Execution::value(json!(op))
    });

    let first = dispatcher.submit("write_preset", vec![json!(1)], 1);
    let second = dispatcher.submit("write_preset", vec![json!(1)], 2);

    assert_eq!(
        first.await,
        Err(TaskError::Panicked("flash write fault".into()))
    );
    assert_eq!(second.await, Ok(json!(2)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(dispatcher.scheduler().lock_count(), 0);
}
