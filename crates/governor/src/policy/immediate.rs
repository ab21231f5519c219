use std::sync::Arc;

use crate::scheduler::Scheduler;
use crate::task::Task;

use super::{Continuation, Policy};

/// Runs the continuation synchronously. The default for unconfigured selectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Policy for Immediate {
    fn process(&self, _scheduler: &Scheduler, _task: &Arc<Task>, next: Continuation) {
        let _ = next.run();
    }
}
