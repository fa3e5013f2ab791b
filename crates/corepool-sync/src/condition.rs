//! Condition variables bound to a [`ReentrantLock`](crate::ReentrantLock)
//!
//! A waiter links a node into the condition's own wait list, releases
//! every hold it has on the lock, and parks until a signaller unlinks its
//! node. It then re-acquires the lock with the same hold count before
//! returning, whatever the outcome (signal, timeout or interrupt).
//!
//! A signalled waiter is not handed the lock; it re-contends for it like
//! any other thread.

use crate::error::{SyncError, SyncResult};
use crate::lock::LockState;
use crate::spinlock::SpinLock;
use crate::thread;
use crate::wait_list::{WaitList, WaitNode};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Condition variable created by [`ReentrantLock::new_condition`](crate::ReentrantLock::new_condition)
pub struct Condition {
    lock: Arc<LockState>,
    waiters: SpinLock<WaitList>,
}

/// How a wait ended
enum Wake {
    Signalled,
    TimedOut,
    Interrupted,
}

impl Condition {
    pub(crate) fn new(lock: Arc<LockState>) -> Self {
        Self {
            lock,
            waiters: SpinLock::new(WaitList::new()),
        }
    }

    fn assert_held(&self) {
        if !self.lock.is_held_by(thread::current_id()) {
            panic!("condition used without holding its reentrant lock");
        }
    }

    /// Release the lock, park until signalled, re-acquire the lock
    ///
    /// # Errors
    ///
    /// [`SyncError::Interrupted`] if the thread was interrupted before or
    /// while waiting. The lock is held again in every case.
    ///
    /// # Panics
    ///
    /// If the calling thread does not hold the bound lock.
    pub fn wait(&self) -> SyncResult<()> {
        self.wait_until(None).map(|_| ())
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`
    ///
    /// Returns the time left before the deadline; [`Duration::ZERO`] means
    /// the wait timed out without being signalled.
    pub fn wait_timeout(&self, timeout: Duration) -> SyncResult<Duration> {
        let start = Instant::now();
        // Too far out to represent: wait without a deadline
        let Some(deadline) = start.checked_add(timeout) else {
            self.wait_until(None)?;
            return Ok(timeout.saturating_sub(start.elapsed()));
        };
        match self.wait_until(Some(deadline))? {
            true => Ok(deadline.saturating_duration_since(Instant::now())),
            false => Ok(Duration::ZERO),
        }
    }

    /// Returns `Ok(true)` when signalled, `Ok(false)` on timeout
    fn wait_until(&self, deadline: Option<Instant>) -> SyncResult<bool> {
        self.assert_held();
        let me = thread::current();
        if me.clear_interrupt() {
            return Err(SyncError::Interrupted);
        }

        let node = WaitNode::new(Arc::clone(&me));
        // Safety: `node` stays on this frame until seen unlinked below
        unsafe { self.waiters.lock().push_back(&node) };
        let saved = self.lock.release_all();

        let wake = loop {
            if !self.waiters.lock().is_linked(&node) {
                break Wake::Signalled;
            }
            if me.is_interrupted() {
                break Wake::Interrupted;
            }
            let timeout = match deadline {
                None => None,
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        break Wake::TimedOut;
                    }
                    Some(d - now)
                }
            };
            me.park(timeout);
        };

        // A signal may race with the timeout or interrupt; whoever unlinks
        // the node decides the outcome
        let signalled = match wake {
            Wake::Signalled => true,
            // Safety: node was linked into this list
            _ => !unsafe { self.waiters.lock().remove(&node) },
        };

        self.lock.acquire(saved);

        match wake {
            // Signal consumed: keep the interrupt pending for the caller
            Wake::Interrupted if !signalled => {
                me.clear_interrupt();
                Err(SyncError::Interrupted)
            }
            _ => Ok(signalled),
        }
    }

    /// Wake the longest-waiting thread, if any
    ///
    /// # Panics
    ///
    /// If the calling thread does not hold the bound lock.
    pub fn signal(&self) {
        self.assert_held();
        let next = self.waiters.lock().pop_front();
        if let Some(t) = next {
            t.unpark();
        }
    }

    /// Wake every waiting thread
    ///
    /// # Panics
    ///
    /// If the calling thread does not hold the bound lock.
    pub fn signal_all(&self) {
        self.assert_held();
        let mut woken = Vec::new();
        {
            let mut waiters = self.waiters.lock();
            while let Some(t) = waiters.pop_front() {
                woken.push(t);
            }
        }
        for t in woken {
            t.unpark();
        }
    }

    /// Whether any thread is waiting on this condition
    ///
    /// # Panics
    ///
    /// If the calling thread does not hold the bound lock.
    pub fn has_waiters(&self) -> bool {
        self.assert_held();
        !self.waiters.lock().is_empty()
    }

    /// Number of threads waiting on this condition
    ///
    /// # Panics
    ///
    /// If the calling thread does not hold the bound lock.
    pub fn wait_queue_length(&self) -> usize {
        self.assert_held();
        self.waiters.lock().len()
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("waiters", &self.waiters.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SyncError;
    use crate::lock::ReentrantLock;
    use crate::thread;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread as std_thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_signal_wakes_waiter() {
        let lock = Arc::new(ReentrantLock::new());
        let cond = Arc::new(lock.new_condition());
        let ready = Arc::new(AtomicBool::new(false));

        let (l2, c2, r2) = (Arc::clone(&lock), Arc::clone(&cond), Arc::clone(&ready));
        let handle = std_thread::spawn(move || {
            l2.lock();
            while !r2.load(Ordering::SeqCst) {
                c2.wait().unwrap();
            }
            let held = l2.is_held_by_current_thread();
            l2.unlock();
            held
        });

        std_thread::sleep(Duration::from_millis(30));
        lock.lock();
        ready.store(true, Ordering::SeqCst);
        cond.signal();
        lock.unlock();

        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_wait_releases_all_holds_and_restores_them() {
        let lock = Arc::new(ReentrantLock::new());
        let cond = Arc::new(lock.new_condition());

        let (l2, c2) = (Arc::clone(&lock), Arc::clone(&cond));
        let handle = std_thread::spawn(move || {
            l2.lock();
            l2.lock();
            l2.lock();
            let remaining = c2.wait_timeout(Duration::from_secs(5)).unwrap();
            let holds = l2.hold_count();
            for _ in 0..holds {
                l2.unlock();
            }
            (remaining, holds)
        });

        // The waiter's three holds must all be released while it waits
        loop {
            if lock.try_lock() {
                if cond.has_waiters() {
                    cond.signal();
                    lock.unlock();
                    break;
                }
                lock.unlock();
            }
            std_thread::yield_now();
        }

        let (remaining, holds) = handle.join().unwrap();
        assert_eq!(holds, 3);
        assert!(remaining > Duration::ZERO);
    }

    #[test]
    fn test_wait_timeout_expires() {
        let lock = ReentrantLock::new();
        let cond = lock.new_condition();

        lock.lock();
        let start = Instant::now();
        let remaining = cond.wait_timeout(Duration::from_millis(40)).unwrap();
        assert_eq!(remaining, Duration::ZERO);
        assert!(start.elapsed() >= Duration::from_millis(35));
        assert!(lock.is_held_by_current_thread());
        assert_eq!(cond.wait_queue_length(), 0);
        lock.unlock();
    }

    #[test]
    fn test_signal_all() {
        let lock = Arc::new(ReentrantLock::with_fairness(true));
        let cond = Arc::new(lock.new_condition());
        let go = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (l, c, g) = (Arc::clone(&lock), Arc::clone(&cond), Arc::clone(&go));
                std_thread::spawn(move || {
                    l.lock();
                    while !g.load(Ordering::SeqCst) {
                        c.wait().unwrap();
                    }
                    l.unlock();
                })
            })
            .collect();

        loop {
            lock.lock();
            let waiting = cond.wait_queue_length();
            if waiting == 4 {
                go.store(true, Ordering::SeqCst);
                cond.signal_all();
                lock.unlock();
                break;
            }
            lock.unlock();
            std_thread::sleep(Duration::from_millis(5));
        }

        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_interrupt_while_waiting() {
        let lock = Arc::new(ReentrantLock::new());
        let cond = Arc::new(lock.new_condition());

        let (tx, rx) = mpsc::channel();
        let (l2, c2) = (Arc::clone(&lock), Arc::clone(&cond));
        let handle = std_thread::spawn(move || {
            l2.lock();
            tx.send(thread::current()).unwrap();
            let result = c2.wait();
            let held = l2.is_held_by_current_thread();
            l2.unlock();
            (result, held, thread::current().is_interrupted())
        });

        let target = rx.recv().unwrap();
        // Once we can take the lock the waiter has released it
        lock.lock();
        target.interrupt();
        lock.unlock();

        let (result, held, still_flagged) = handle.join().unwrap();
        assert_eq!(result, Err(SyncError::Interrupted));
        assert!(held);
        assert!(!still_flagged);
    }

    #[test]
    #[should_panic(expected = "without holding")]
    fn test_signal_without_lock_panics() {
        let lock = ReentrantLock::new();
        let cond = lock.new_condition();
        cond.signal();
    }

    #[test]
    fn test_wait_timeout_beyond_instant_range() {
        let lock = Arc::new(ReentrantLock::new());
        let cond = Arc::new(lock.new_condition());
        let ready = Arc::new(AtomicBool::new(false));

        let (l2, c2, r2) = (Arc::clone(&lock), Arc::clone(&cond), Arc::clone(&ready));
        let handle = std_thread::spawn(move || {
            l2.lock();
            let mut left = Duration::MAX;
            while !r2.load(Ordering::SeqCst) {
                left = c2.wait_timeout(Duration::MAX).unwrap();
            }
            l2.unlock();
            left
        });

        std_thread::sleep(Duration::from_millis(30));
        lock.lock();
        ready.store(true, Ordering::SeqCst);
        cond.signal();
        lock.unlock();

        assert!(handle.join().unwrap() > Duration::from_secs(3600));
    }
}
