//! Worker records
//!
//! A worker owns one thread, an optional first task, and a one-permit
//! busy lock. The worker holds the busy lock for exactly as long as it is
//! running a task, so anyone who can `try_lock` it knows the worker is
//! idle (or not started yet) and may be interrupted safely.

use crate::task::Job;
use corepool_sync::{SpinLock, SpinLockGuard, ThreadHandle};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

pub(crate) struct Worker {
    id: u64,

    /// Set by the worker thread itself before it looks at the pool state
    thread: OnceLock<Arc<ThreadHandle>>,

    /// Task to run before polling the queue; handed back if start fails
    first_task: SpinLock<Option<Job>>,

    busy: SpinLock<()>,

    completed: AtomicU64,
}

impl Worker {
    pub(crate) fn new(id: u64, first_task: Option<Job>) -> Self {
        Self {
            id,
            thread: OnceLock::new(),
            first_task: SpinLock::new(first_task),
            busy: SpinLock::new(()),
            completed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Record the calling thread as this worker's thread
    pub(crate) fn bind_current_thread(&self) -> Arc<ThreadHandle> {
        let me = corepool_sync::current();
        let _ = self.thread.set(Arc::clone(&me));
        me
    }

    pub(crate) fn thread(&self) -> Option<&Arc<ThreadHandle>> {
        self.thread.get()
    }

    pub(crate) fn take_first_task(&self) -> Option<Job> {
        self.first_task.lock().take()
    }

    /// Mark the worker busy for the lifetime of the guard
    pub(crate) fn begin_task(&self) -> SpinLockGuard<'_, ()> {
        self.busy.lock()
    }

    pub(crate) fn try_lock_idle(&self) -> Option<SpinLockGuard<'_, ()>> {
        self.busy.try_lock()
    }

    #[inline]
    pub(crate) fn is_busy(&self) -> bool {
        self.busy.is_locked()
    }

    pub(crate) fn task_done(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn completed_tasks(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Interrupt the worker's thread if it is idle and not already flagged
    ///
    /// Returns whether an interrupt was delivered.
    pub(crate) fn interrupt_if_idle(&self) -> bool {
        let Some(t) = self.thread() else {
            return false;
        };
        if t.is_interrupted() {
            return false;
        }
        match self.try_lock_idle() {
            Some(_idle) => {
                t.interrupt();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("busy", &self.is_busy())
            .field("completed", &self.completed_tasks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_first_task_handed_back() {
        let w = Worker::new(1, Some(Job::new(9, Box::new(|| {}))));
        assert_eq!(w.take_first_task().map(|j| j.id()), Some(9));
        assert!(w.take_first_task().is_none());
    }

    #[test]
    fn test_busy_worker_not_interrupted() {
        let w = Arc::new(Worker::new(1, None));
        assert!(!w.interrupt_if_idle(), "no thread bound yet");

        let (tx, rx) = mpsc::channel();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let w2 = Arc::clone(&w);
        let t = thread::spawn(move || {
            let me = w2.bind_current_thread();
            {
                let _busy = w2.begin_task();
                tx.send(()).unwrap();
                go_rx.recv().unwrap();
            }
            w2.task_done();
            me.clear_interrupt()
        });

        rx.recv().unwrap();
        assert!(w.is_busy());
        assert!(!w.interrupt_if_idle());
        go_tx.send(()).unwrap();
        assert!(!t.join().unwrap(), "busy worker must not see an interrupt");
        assert_eq!(w.completed_tasks(), 1);

        // Idle now: interrupt goes through
        assert!(w.interrupt_if_idle());
        assert!(w.thread().unwrap().is_interrupted());
    }
}
