use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::scheduler::Scheduler;
use crate::sync::lock;
use crate::task::Task;

use super::{Continuation, Policy};

/// Per-key slot. Its presence in the map means a task for the key is running.
#[derive(Default)]
struct Slot {
    queued: Option<(Arc<Task>, Continuation)>,
}

type Slots<K> = Arc<Mutex<HashMap<K, Slot>>>;

/// Coalesces bursts so that at most one task per key is in flight.
///
/// While a task runs, newer same-key tasks replace each other in a single
/// queue slot; each replaced task is cancelled. When the running task
/// settles the queued one (the latest of the burst) starts next.
pub struct LeastCommits<K> {
    key: Arc<dyn Fn(&Task) -> K + Send + Sync>,
    slots: Slots<K>,
}

impl<K> LeastCommits<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    pub fn new(key: impl Fn(&Task) -> K + Send + Sync + 'static) -> Self {
        Self {
            key: Arc::new(key),
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of keys with a task in flight.
    pub fn running_keys(&self) -> usize {
        lock(&self.slots).len()
    }
}

impl<K> Policy for LeastCommits<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    fn process(&self, scheduler: &Scheduler, task: &Arc<Task>, next: Continuation) {
        let key = (self.key)(task);
        let mut slots = lock(&self.slots);
        match slots.get_mut(&key) {
            Some(slot) => {
                let replaced = slot.queued.replace((Arc::clone(task), next));
                drop(slots);
                debug!(task_id = task.id(), ?key, "task queued behind running task");
                if let Some((prev, _)) = replaced {
                    debug!(task_id = prev.id(), by = task.id(), ?key, "queued task dropped");
                    scheduler.cancel(&prev);
                }
            }
            None => {
                slots.insert(key.clone(), Slot::default());
                drop(slots);
                start(scheduler.clone(), Arc::clone(&self.slots), key, Arc::clone(task), next);
            }
        }
    }
}

fn start<K>(scheduler: Scheduler, slots: Slots<K>, key: K, task: Arc<Task>, next: Continuation)
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    let promote_once = {
        let scheduler = scheduler.clone();
        let key = key.clone();
        let promoted = Arc::new(AtomicBool::new(false));
        move || {
            if !promoted.swap(true, Ordering::SeqCst) {
                promote(scheduler.clone(), Arc::clone(&slots), key.clone());
            }
        }
    };
    {
        let promote_once = promote_once.clone();
        task.on_fulfilled(move |_| promote_once());
    }
    if !task.is_pending() {
        // Settled elsewhere before it got its turn; the callback may have been dropped.
        promote_once();
        return;
    }

    let lock_wait = scheduler.wait_on_lock(&task);
    debug!(task_id = task.id(), ?key, "least-commits task starting");
    tokio::spawn(async move {
        lock_wait.await;
        let _ = next.run();
    });
}

/// Start the queued task for `key`, or mark the key idle.
fn promote<K>(scheduler: Scheduler, slots: Slots<K>, key: K)
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    let queued = {
        let mut map = lock(&slots);
        match map.get_mut(&key).and_then(|slot| slot.queued.take()) {
            Some(queued) => Some(queued),
            None => {
                map.remove(&key);
                None
            }
        }
    };
    if let Some((task, next)) = queued {
        debug!(task_id = task.id(), ?key, "promoting queued task");
        start(scheduler, slots, key, task, next);
    }
}
