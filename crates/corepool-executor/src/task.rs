//! Queued units of work

use std::fmt;

/// A task as submitted by callers
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A task plus the identity the executor tracks it by
///
/// The id lets the executor pull back exactly the job it just enqueued
/// when it finds the pool shutting down.
pub struct Job {
    id: u64,
    task: Task,
}

impl Job {
    pub(crate) fn new(id: u64, task: Task) -> Self {
        Self { id, task }
    }

    /// Executor-assigned id, unique per pool
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Run the task on the calling thread
    pub fn run(self) {
        (self.task)()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish_non_exhaustive()
    }
}
