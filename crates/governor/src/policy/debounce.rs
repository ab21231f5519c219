use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::scheduler::Scheduler;
use crate::sync::lock;
use crate::task::Task;

use super::{Continuation, Policy};

struct Pending {
    task: Arc<Task>,
    timer: JoinHandle<()>,
}

/// Delays execution until no task with the same key has arrived for `delay`.
///
/// A newer same-key task cancels the pending one and restarts the timer, so
/// only the last task of a burst runs. When the timer fires the task still
/// waits on any lock that matches it before running.
pub struct Debounce<K> {
    key: Arc<dyn Fn(&Task) -> K + Send + Sync>,
    delay: Duration,
    pending: Arc<Mutex<HashMap<K, Pending>>>,
}

impl<K> Debounce<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    pub fn new(key: impl Fn(&Task) -> K + Send + Sync + 'static, delay: Duration) -> Self {
        Self {
            key: Arc::new(key),
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Number of keys with a task waiting for its quiet period.
    pub fn pending_keys(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl<K> Policy for Debounce<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    fn process(&self, scheduler: &Scheduler, task: &Arc<Task>, next: Continuation) {
        let key = (self.key)(task);

        let superseded = {
            let mut pending = lock(&self.pending);
            let superseded = pending.remove(&key).map(|prev| {
                prev.timer.abort();
                prev.task
            });

            // Spawned while the map is locked so the timer cannot clear the
            // entry before it is inserted.
            let timer = tokio::spawn({
                let scheduler = scheduler.clone();
                let task = Arc::clone(task);
                let entries = Arc::clone(&self.pending);
                let key = key.clone();
                let delay = self.delay;
                async move {
                    tokio::time::sleep(delay).await;
                    scheduler.wait_on_lock(&task).await;
                    {
                        let mut entries = lock(&entries);
                        // A newer task may have superseded this one after the timer woke.
                        if !entries.get(&key).is_some_and(|e| e.task.id() == task.id()) {
                            return;
                        }
                        entries.remove(&key);
                    }
                    if !task.is_pending() {
                        return;
                    }
                    debug!(task_id = task.id(), ?key, "debounce quiet period elapsed");
                    let _ = next.run();
                }
            });

            pending.insert(
                key.clone(),
                Pending {
                    task: Arc::clone(task),
                    timer,
                },
            );
            superseded
        };

        if let Some(prev) = superseded {
            debug!(task_id = prev.id(), by = task.id(), ?key, "debounced task superseded");
            scheduler.cancel(&prev);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::policy::keys::by_parameter;
    use crate::task::TaskState;
    use crate::test_support::{instant, RunLog};

    #[tokio::test(start_paused = true)]
    async fn only_last_task_of_burst_runs() {
        let scheduler = Scheduler::new();
        let policy = Debounce::new(by_parameter(0), Duration::from_millis(50));
        let log = RunLog::default();

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let t = scheduler.new_task("set_gain", vec![json!(1)]);
                policy.process(&scheduler, &t, instant(&scheduler, &t, &log));
                t
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(49)).await;
        assert!(log.ids().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(log.ids(), vec![tasks[3].id()]);
        for t in &tasks[..3] {
            assert_eq!(t.state(), TaskState::Cancelled);
        }
        assert_eq!(tasks[3].state(), TaskState::Succeeded);
        assert_eq!(policy.pending_keys(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_debounce_independently() {
        let scheduler = Scheduler::new();
        let policy = Debounce::new(by_parameter(0), Duration::from_millis(50));
        let log = RunLog::default();

        let a = scheduler.new_task("set_gain", vec![json!(1)]);
        policy.process(&scheduler, &a, instant(&scheduler, &a, &log));
        let b = scheduler.new_task("set_gain", vec![json!(2)]);
        policy.process(&scheduler, &b, instant(&scheduler, &b, &log));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(log.ids(), vec![a.id(), b.id()]);
    }

    #[tokio::test(start_paused = true)]
    async fn fired_timer_waits_on_matching_lock() {
        let scheduler = Scheduler::new();
        let policy = Debounce::new(by_parameter(0), Duration::from_millis(10));
        let log = RunLog::default();
        let unlock = scheduler.lock(|_| true);

        let a = scheduler.new_task("set_gain", vec![json!(1)]);
        policy.process(&scheduler, &a, instant(&scheduler, &a, &log));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(log.ids().is_empty());

        unlock.release();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(log.ids(), vec![a.id()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn superseded_after_timer_woke_does_not_run() {
        use std::sync::mpsc;

        let scheduler = Scheduler::new();
        let policy = Debounce::new(by_parameter(0), Duration::from_millis(5));
        let log = RunLog::default();

        let a = scheduler.new_task("set_gain", vec![json!(1)]);
        let (entered_tx, entered_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel::<()>();
        let resume_rx = std::sync::Mutex::new(resume_rx);
        let held_id = a.id();
        // Never matches, but parks A's fired timer while the predicate runs.
        let _unlock = scheduler.lock(move |t| {
            if t.id() == held_id {
                let _ = entered_tx.send(());
                let _ = resume_rx.lock().unwrap().recv();
            }
            false
        });

        policy.process(&scheduler, &a, instant(&scheduler, &a, &log));
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let b = scheduler.new_task("set_gain", vec![json!(1)]);
        policy.process(&scheduler, &b, instant(&scheduler, &b, &log));
        assert_eq!(a.state(), TaskState::Cancelled);
        resume_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), b.settled()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(log.ids(), vec![b.id()]);
        assert_eq!(policy.pending_keys(), 0);
    }
}
