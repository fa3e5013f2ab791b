//! Result handles for submitted tasks
//!
//! [`TaskHandle`] is the caller's side; the executor runs the matching
//! [`Completer`] inside an ordinary job. The shared slot is a
//! [`ReentrantMutex`] with one `done` condition:
//!
//! ```text
//!   Pending ──run──► Running ──► Done(Ok | Panicked)
//!      │                                │
//!      └──cancel / dropped unrun──► Done(Cancelled)      get ──► Taken
//! ```

use crate::error::TaskError;
use corepool_sync::{Condition, ReentrantMutex};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

enum Slot<R> {
    Pending,
    Running,
    Done(Result<R, TaskError>),
    Taken,
}

struct Shared<R> {
    slot: ReentrantMutex<RefCell<Slot<R>>>,
    done: Condition,
}

/// Handle to the eventual result of a submitted task
pub struct TaskHandle<R> {
    shared: Arc<Shared<R>>,
}

/// Producer side, moved into the job that runs the task
pub(crate) struct Completer<R> {
    shared: Arc<Shared<R>>,
}

/// Create a connected handle/completer pair
pub(crate) fn task_pair<R>() -> (TaskHandle<R>, Completer<R>) {
    let slot = ReentrantMutex::new(RefCell::new(Slot::Pending));
    let done = slot.new_condition();
    let shared = Arc::new(Shared { slot, done });
    (
        TaskHandle {
            shared: Arc::clone(&shared),
        },
        Completer { shared },
    )
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<R> Completer<R> {
    /// Run `f` unless the handle was cancelled first, and publish the outcome
    ///
    /// A panic in `f` is captured as [`TaskError::Panicked`].
    pub(crate) fn complete_with<F>(self, f: F)
    where
        F: FnOnce() -> R,
    {
        {
            let g = self.shared.slot.lock();
            let mut slot = g.borrow_mut();
            if !matches!(*slot, Slot::Pending) {
                return;
            }
            *slot = Slot::Running;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(f))
            .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
        self.finish(outcome);
    }

    /// Store `outcome` if nothing final is stored yet
    fn finish(&self, outcome: Result<R, TaskError>) {
        let g = self.shared.slot.lock();
        let settled = {
            let mut slot = g.borrow_mut();
            if matches!(*slot, Slot::Pending | Slot::Running) {
                *slot = Slot::Done(outcome);
                true
            } else {
                false
            }
        };
        if settled {
            self.shared.done.signal_all();
        }
    }
}

impl<R> Drop for Completer<R> {
    fn drop(&mut self) {
        // Dropped without running: rejected, discarded or drained
        self.finish(Err(TaskError::Cancelled));
    }
}

impl<R> TaskHandle<R> {
    /// Block until the task finishes and return its result
    pub fn get(self) -> Result<R, TaskError> {
        self.wait_for(None)
    }

    /// Like [`get`](Self::get) but gives up with [`TaskError::Timeout`]
    ///
    /// On success the value is moved out; later calls report
    /// [`TaskError::Consumed`].
    pub fn get_timeout(&self, timeout: Duration) -> Result<R, TaskError> {
        self.wait_for(Some(timeout))
    }

    fn wait_for(&self, timeout: Option<Duration>) -> Result<R, TaskError> {
        let g = self
            .shared
            .slot
            .lock_interruptibly()
            .map_err(|_| TaskError::Interrupted)?;
        let mut remaining = timeout;
        loop {
            let taken = {
                let mut slot = g.borrow_mut();
                match mem::replace(&mut *slot, Slot::Taken) {
                    Slot::Done(result) => Some(result),
                    Slot::Taken => Some(Err(TaskError::Consumed)),
                    other => {
                        *slot = other;
                        None
                    }
                }
            };
            if let Some(result) = taken {
                return result;
            }

            match remaining {
                None => self
                    .shared
                    .done
                    .wait()
                    .map_err(|_| TaskError::Interrupted)?,
                Some(left) if left.is_zero() => return Err(TaskError::Timeout),
                Some(left) => {
                    remaining = Some(
                        self.shared
                            .done
                            .wait_timeout(left)
                            .map_err(|_| TaskError::Interrupted)?,
                    );
                }
            }
        }
    }

    /// Cancel the task if it has not started
    ///
    /// Returns `true` if this call cancelled it. A running task is left to
    /// finish.
    pub fn cancel(&self) -> bool {
        let g = self.shared.slot.lock();
        let cancelled = {
            let mut slot = g.borrow_mut();
            if matches!(*slot, Slot::Pending) {
                *slot = Slot::Done(Err(TaskError::Cancelled));
                true
            } else {
                false
            }
        };
        if cancelled {
            self.shared.done.signal_all();
        }
        cancelled
    }

    /// Whether the task has finished, failed or been cancelled
    pub fn is_done(&self) -> bool {
        let g = self.shared.slot.lock();
        let done = !matches!(*g.borrow(), Slot::Pending | Slot::Running);
        done
    }

    /// Whether the task ended up cancelled
    pub fn is_cancelled(&self) -> bool {
        let g = self.shared.slot.lock();
        let cancelled = matches!(*g.borrow(), Slot::Done(Err(TaskError::Cancelled)));
        cancelled
    }
}

impl<R> fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_complete_then_get() {
        let (handle, completer) = task_pair();
        assert!(!handle.is_done());
        completer.complete_with(|| 5);
        assert!(handle.is_done());
        assert_eq!(handle.get(), Ok(5));
    }

    #[test]
    fn test_get_blocks_until_completed() {
        let (handle, completer) = task_pair();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            completer.complete_with(|| "late");
        });
        assert_eq!(handle.get(), Ok("late"));
        worker.join().unwrap();
    }

    #[test]
    fn test_get_timeout() {
        let (handle, completer) = task_pair::<u8>();
        let start = Instant::now();
        assert_eq!(
            handle.get_timeout(Duration::from_millis(30)),
            Err(TaskError::Timeout)
        );
        assert!(start.elapsed() >= Duration::from_millis(25));

        completer.complete_with(|| 1);
        assert_eq!(handle.get_timeout(Duration::from_millis(30)), Ok(1));
        assert_eq!(
            handle.get_timeout(Duration::from_millis(30)),
            Err(TaskError::Consumed)
        );
    }

    #[test]
    fn test_panic_captured() {
        let (handle, completer) = task_pair::<()>();
        completer.complete_with(|| panic!("kaboom"));
        assert_eq!(handle.get(), Err(TaskError::Panicked("kaboom".into())));
    }

    #[test]
    fn test_cancel_before_run_skips_task() {
        let (handle, completer) = task_pair();
        assert!(handle.cancel());
        assert!(!handle.cancel());
        let mut ran = false;
        completer.complete_with(|| ran = true);
        assert!(!ran);
        assert!(handle.is_cancelled());
        assert_eq!(handle.get(), Err(TaskError::Cancelled));
    }

    #[test]
    fn test_dropped_completer_cancels() {
        let (handle, completer) = task_pair::<i32>();
        drop(completer);
        assert_eq!(handle.get(), Err(TaskError::Cancelled));
    }

    #[test]
    fn test_get_timeout_unbounded() {
        let (handle, completer) = task_pair();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            completer.complete_with(|| 11);
        });
        assert_eq!(handle.get_timeout(Duration::MAX), Ok(11));
        worker.join().unwrap();
    }
}
