use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::sync::{lock, Signal};
use crate::task::Task;

use super::core::SchedulerInner;
use super::Scheduler;

/// Pure predicate selecting the not-yet-started tasks a lock holds back.
pub type LockPredicate = Arc<dyn Fn(&Task) -> bool + Send + Sync>;

pub(crate) struct LockEntry {
    id: u64,
    predicate: LockPredicate,
    released: Arc<Signal>,
}

/// Handle returned by [`Scheduler::lock`].
///
/// Calling [`Unlock::release`] removes the lock and wakes everyone waiting
/// on it. Dropping the handle releases the lock as well.
#[must_use = "dropping the handle releases the lock immediately"]
pub struct Unlock {
    scheduler: Arc<SchedulerInner>,
    id: u64,
    released: Arc<Signal>,
}

impl Unlock {
    pub fn release(self) {
        self.release_inner();
    }

    fn release_inner(&self) {
        if self.released.is_fired() {
            return;
        }
        lock(&self.scheduler.locks).retain(|entry| entry.id != self.id);
        self.released.fire();
        debug!(lock_id = self.id, "lock released");
    }
}

impl Drop for Unlock {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl Scheduler {
    /// Register a lock over every task matching `predicate`.
    pub fn lock(&self, predicate: impl Fn(&Task) -> bool + Send + Sync + 'static) -> Unlock {
        let id = self.inner.next_lock_id.fetch_add(1, Ordering::SeqCst);
        let released = Arc::new(Signal::new());
        lock(&self.inner.locks).push(LockEntry {
            id,
            predicate: Arc::new(predicate),
            released: Arc::clone(&released),
        });
        lock(&self.inner.stats).locks_acquired += 1;
        debug!(lock_id = id, "lock acquired");
        Unlock {
            scheduler: Arc::clone(&self.inner),
            id,
            released,
        }
    }

    /// Wait until every lock matching `task` right now has been released.
    ///
    /// The set of locks is fixed when this is called; locks registered later
    /// are not awaited.
    pub fn wait_on_lock(&self, task: &Task) -> impl Future<Output = ()> + Send + 'static {
        let candidates: Vec<(LockPredicate, Arc<Signal>)> = lock(&self.inner.locks)
            .iter()
            .map(|entry| (Arc::clone(&entry.predicate), Arc::clone(&entry.released)))
            .collect();
        // Predicates run outside the registry lock so they may query the scheduler.
        let blocking: Vec<Arc<Signal>> = candidates
            .into_iter()
            .filter(|(predicate, _)| predicate(task))
            .map(|(_, released)| released)
            .collect();
        if !blocking.is_empty() {
            debug!(task_id = task.id(), locks = blocking.len(), "task waiting on locks");
        }
        async move {
            join_all(blocking.iter().map(|released| released.wait())).await;
        }
    }

    /// Wait until every live task matching `predicate` has settled.
    ///
    /// Only tasks live at the time of the call are awaited.
    pub fn wait(&self, predicate: impl Fn(&Task) -> bool) -> impl Future<Output = ()> + Send + 'static {
        let tasks = self.query(predicate);
        async move {
            join_all(tasks.iter().map(|task| task.settled())).await;
        }
    }
}
