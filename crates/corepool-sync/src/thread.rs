//! Per-thread handles: identity, parking and interruption
//!
//! Every OS thread that touches a corepool primitive lazily gets a
//! [`ThreadHandle`]. The handle is what wait lists store: it gives lock
//! owners a cheap numeric identity, lets releasers unpark a blocked
//! thread, and carries the sticky interrupt flag used to wake idle
//! workers during shutdown.
//!
//! Interruption is cooperative. [`ThreadHandle::interrupt`] sets the flag
//! and unparks the thread; interruptible waits observe the flag, clear it,
//! and return [`SyncError::Interrupted`](crate::SyncError::Interrupted).
//! Non-interruptible waits ignore it and leave it set.

use crate::parking::{Park, Parker};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Id 0 is reserved for "no owner"
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Arc<ThreadHandle> = Arc::new(ThreadHandle::new());
}

/// Shared handle to one OS thread
pub struct ThreadHandle {
    id: u64,
    interrupted: AtomicBool,
    parker: Parker,
}

impl ThreadHandle {
    fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            interrupted: AtomicBool::new(false),
            parker: Parker::new(),
        }
    }

    /// Process-unique, non-zero thread id
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Request interruption of this thread
    ///
    /// Sets the interrupt flag and wakes the thread if it is parked.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.parker.unpark();
    }

    /// Check the interrupt flag without clearing it
    #[inline]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Clear the interrupt flag, returning whether it was set
    #[inline]
    pub fn clear_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn park(&self, timeout: Option<Duration>) -> bool {
        self.parker.park(timeout)
    }

    pub(crate) fn unpark(&self) {
        self.parker.unpark();
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.id)
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

/// Handle of the calling thread
pub fn current() -> Arc<ThreadHandle> {
    CURRENT.with(Arc::clone)
}

/// Id of the calling thread, without cloning its handle
#[inline]
pub fn current_id() -> u64 {
    CURRENT.with(|h| h.id)
}

/// Test and clear the calling thread's interrupt flag
pub fn interrupted() -> bool {
    CURRENT.with(|h| h.clear_interrupt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ids_are_unique_and_stable() {
        let here = current_id();
        assert_ne!(here, 0);
        assert_eq!(here, current().id());

        let other = thread::spawn(current_id).join().unwrap();
        assert_ne!(here, other);
    }

    #[test]
    fn test_interrupt_flag() {
        let me = current();
        assert!(!interrupted());

        me.interrupt();
        assert!(me.is_interrupted());
        assert!(interrupted());
        assert!(!me.is_interrupted());
        // The unpark left a permit behind; consume it
        me.park(Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_interrupt_wakes_parked_thread() {
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = thread::spawn(move || {
            tx.send(current()).unwrap();
            while !current().is_interrupted() {
                current().park(None);
            }
            interrupted()
        });

        let target = rx.recv().unwrap();
        thread::sleep(Duration::from_millis(20));
        target.interrupt();
        assert!(handle.join().unwrap());
    }
}
