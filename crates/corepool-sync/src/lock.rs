//! Reentrant exclusive lock
//!
//! The lock state is one atomic hold count plus the owner's thread id:
//!
//! ```text
//!   state == 0                 unowned, owner == 0
//!   state == n > 0             held n times by `owner`
//! ```
//!
//! Acquisition is a CAS of `state` from 0 to the requested count. A thread
//! that loses links a [`WaitNode`] into the lock's wait list, retries, and
//! parks; a releaser that drops `state` to 0 unparks the head of the list,
//! which then retries. The retry-after-enqueue ordering is what rules out
//! lost wake-ups: either the releaser sees the node, or the node's owner
//! sees `state == 0`.
//!
//! # Fairness
//!
//! - **Non-fair** (default): `lock()` first tries a single CAS, and every
//!   retry may win against queued threads (barging). Higher throughput,
//!   no ordering guarantee, waiters may starve under sustained contention.
//! - **Fair**: a thread may only take an unowned lock when no other thread
//!   is queued ahead of it, so grants follow arrival order.

use crate::condition::Condition;
use crate::error::{SyncError, SyncResult};
use crate::spinlock::SpinLock;
use crate::thread::{self, ThreadHandle};
use crate::wait_list::{WaitList, WaitNode};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared state behind a [`ReentrantLock`] and its conditions
pub(crate) struct LockState {
    /// Hold count; 0 means unowned
    state: AtomicI32,

    /// Id of the owning thread; 0 means none
    owner: AtomicU64,

    /// Threads blocked in acquire
    waiters: SpinLock<WaitList>,

    fair: bool,
}

impl LockState {
    fn new(fair: bool) -> Self {
        Self {
            state: AtomicI32::new(0),
            owner: AtomicU64::new(0),
            waiters: SpinLock::new(WaitList::new()),
            fair,
        }
    }

    #[inline]
    pub(crate) fn is_held_by(&self, id: u64) -> bool {
        self.owner.load(Ordering::Relaxed) == id && self.state.load(Ordering::Relaxed) > 0
    }

    /// Someone other than `me` is at the head of the wait list
    fn has_queued_predecessors(&self, me: u64) -> bool {
        match self.waiters.lock().front() {
            Some(head) => head.id() != me,
            None => false,
        }
    }

    /// Reentrant increment by the current owner
    fn reenter(&self, c: i32, acquires: i32) {
        let next = c
            .checked_add(acquires)
            .unwrap_or_else(|| panic!("maximum lock count exceeded"));
        self.state.store(next, Ordering::Relaxed);
    }

    /// One acquisition attempt honouring the fairness policy
    fn try_acquire(&self, me: u64, acquires: i32) -> bool {
        let c = self.state.load(Ordering::Acquire);
        if c == 0 {
            if self.fair && self.has_queued_predecessors(me) {
                return false;
            }
            if self
                .state
                .compare_exchange(0, acquires, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                self.owner.store(me, Ordering::Relaxed);
                return true;
            }
        } else if self.owner.load(Ordering::Relaxed) == me {
            self.reenter(c, acquires);
            return true;
        }
        false
    }

    /// One acquisition attempt that ignores queued threads
    fn try_acquire_barging(&self, me: u64, acquires: i32) -> bool {
        let c = self.state.load(Ordering::Acquire);
        if c == 0 {
            if self
                .state
                .compare_exchange(0, acquires, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                self.owner.store(me, Ordering::Relaxed);
                return true;
            }
        } else if self.owner.load(Ordering::Relaxed) == me {
            self.reenter(c, acquires);
            return true;
        }
        false
    }

    /// Block until `acquires` holds are taken, uninterruptibly
    pub(crate) fn acquire(&self, acquires: i32) {
        let me = thread::current_id();
        if self.try_acquire(me, acquires) {
            return;
        }
        // Without interruption or deadline the only outcome is success
        let _ = self.acquire_queued(&thread::current(), acquires, false, None);
    }

    /// Enqueue, then retry/park until acquired, interrupted or timed out
    fn acquire_queued(
        &self,
        me: &Arc<ThreadHandle>,
        acquires: i32,
        interruptible: bool,
        deadline: Option<Instant>,
    ) -> SyncResult<()> {
        let node = WaitNode::new(Arc::clone(me));
        // Safety: `node` stays on this frame until unlinked below
        unsafe { self.waiters.lock().push_back(&node) };

        loop {
            if self.try_acquire(me.id(), acquires) {
                // Safety: node was linked into this list
                unsafe { self.waiters.lock().remove(&node) };
                return Ok(());
            }

            let failure = if interruptible && me.clear_interrupt() {
                Some(SyncError::Interrupted)
            } else {
                None
            };

            let timeout = match (failure, deadline) {
                (Some(_), _) => None,
                (None, None) => None,
                (None, Some(d)) => {
                    let now = Instant::now();
                    if now >= d {
                        self.cancel_acquire(&node);
                        return Err(SyncError::Timeout);
                    }
                    Some(d - now)
                }
            };

            if let Some(err) = failure {
                self.cancel_acquire(&node);
                return Err(err);
            }

            me.park(timeout);
        }
    }

    /// Unlink a waiter that gave up, passing any wake-up it absorbed on
    fn cancel_acquire(&self, node: &WaitNode) {
        let next = {
            let mut waiters = self.waiters.lock();
            // Safety: node was linked into this list
            unsafe { waiters.remove(node) };
            if self.state.load(Ordering::Acquire) == 0 {
                waiters.front().cloned()
            } else {
                None
            }
        };
        if let Some(t) = next {
            t.unpark();
        }
    }

    /// Drop `releases` holds. Returns true when the lock became free.
    ///
    /// # Panics
    ///
    /// If the calling thread does not own the lock.
    pub(crate) fn release(&self, releases: i32) -> bool {
        let me = thread::current_id();
        if self.owner.load(Ordering::Relaxed) != me {
            panic!("unlock of a reentrant lock not held by the current thread");
        }
        let c = self.state.load(Ordering::Relaxed) - releases;
        if c < 0 {
            panic!("reentrant lock released more times than acquired");
        }
        let free = c == 0;
        if free {
            self.owner.store(0, Ordering::Relaxed);
        }
        self.state.store(c, Ordering::Release);
        if free {
            self.unpark_head();
        }
        free
    }

    /// Release every hold of the current owner, returning the count
    ///
    /// # Panics
    ///
    /// If the calling thread does not own the lock.
    pub(crate) fn release_all(&self) -> i32 {
        if !self.is_held_by(thread::current_id()) {
            panic!("condition used without holding its reentrant lock");
        }
        let saved = self.state.load(Ordering::Relaxed);
        self.release(saved);
        saved
    }

    fn unpark_head(&self) {
        let head = self.waiters.lock().front().cloned();
        if let Some(t) = head {
            t.unpark();
        }
    }
}

/// A reentrant mutual-exclusion lock with explicit `lock`/`unlock`
///
/// The same thread may acquire the lock repeatedly; it must call
/// [`unlock`](Self::unlock) once per acquisition before any other thread can
/// take it. Conditions created by [`new_condition`](Self::new_condition) are
/// bound to this lock.
///
/// # Example
///
/// ```
/// use corepool_sync::ReentrantLock;
///
/// let lock = ReentrantLock::new();
/// lock.lock();
/// lock.lock();
/// assert_eq!(lock.hold_count(), 2);
/// lock.unlock();
/// lock.unlock();
/// assert!(!lock.is_locked());
/// ```
pub struct ReentrantLock {
    sync: Arc<LockState>,
}

impl ReentrantLock {
    /// Create a non-fair lock
    pub fn new() -> Self {
        Self::with_fairness(false)
    }

    /// Create a lock with the given fairness policy
    pub fn with_fairness(fair: bool) -> Self {
        Self {
            sync: Arc::new(LockState::new(fair)),
        }
    }

    /// Acquire the lock, blocking until it is available
    ///
    /// Interrupts are ignored while blocked and left pending.
    ///
    /// # Panics
    ///
    /// If the hold count would overflow.
    pub fn lock(&self) {
        if !self.sync.fair {
            // Fast path: uncontended CAS straight to owned-by-me
            if self
                .sync
                .state
                .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                self.sync.owner.store(thread::current_id(), Ordering::Relaxed);
                return;
            }
        }
        self.sync.acquire(1);
    }

    /// Acquire the lock unless the calling thread is interrupted
    pub fn lock_interruptibly(&self) -> SyncResult<()> {
        let me = thread::current();
        if me.clear_interrupt() {
            return Err(SyncError::Interrupted);
        }
        if self.sync.try_acquire(me.id(), 1) {
            return Ok(());
        }
        self.sync.acquire_queued(&me, 1, true, None)
    }

    /// Acquire the lock only if it is free (or already ours) right now
    ///
    /// Barges even on a fair lock.
    pub fn try_lock(&self) -> bool {
        self.sync.try_acquire_barging(thread::current_id(), 1)
    }

    /// Acquire the lock, waiting at most `timeout`
    ///
    /// Honours fairness. Returns `Ok(false)` if the timeout elapsed.
    pub fn try_lock_for(&self, timeout: Duration) -> SyncResult<bool> {
        let me = thread::current();
        if me.clear_interrupt() {
            return Err(SyncError::Interrupted);
        }
        if self.sync.try_acquire(me.id(), 1) {
            return Ok(true);
        }
        if timeout.is_zero() {
            return Ok(false);
        }
        // An unrepresentable deadline means wait as long as it takes
        let deadline = Instant::now().checked_add(timeout);
        match self.sync.acquire_queued(&me, 1, true, deadline) {
            Ok(()) => Ok(true),
            Err(SyncError::Timeout) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Release one hold; frees the lock when the hold count reaches zero
    ///
    /// # Panics
    ///
    /// If the calling thread does not own the lock. This indicates broken
    /// locking discipline and is never a recoverable condition.
    pub fn unlock(&self) {
        self.sync.release(1);
    }

    /// Acquire the lock and return a guard that unlocks on drop
    pub fn lock_guard(&self) -> ReentrantLockGuard<'_> {
        self.lock();
        ReentrantLockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Create a condition variable bound to this lock
    pub fn new_condition(&self) -> Condition {
        Condition::new(Arc::clone(&self.sync))
    }

    /// Whether this lock grants acquisition in arrival order
    #[inline]
    pub fn is_fair(&self) -> bool {
        self.sync.fair
    }

    /// Whether any thread holds the lock
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.sync.state.load(Ordering::Relaxed) != 0
    }

    /// Whether the calling thread holds the lock
    #[inline]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.sync.is_held_by(thread::current_id())
    }

    /// Number of holds by the calling thread (0 if it is not the owner)
    pub fn hold_count(&self) -> i32 {
        if self.is_held_by_current_thread() {
            self.sync.state.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    /// Whether any thread is blocked waiting for this lock
    pub fn has_queued_threads(&self) -> bool {
        !self.sync.waiters.lock().is_empty()
    }

    /// Number of threads blocked waiting for this lock
    pub fn queue_length(&self) -> usize {
        self.sync.waiters.lock().len()
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantLock")
            .field("fair", &self.sync.fair)
            .field("holds", &self.sync.state.load(Ordering::Relaxed))
            .field("owner", &self.sync.owner.load(Ordering::Relaxed))
            .finish()
    }
}

/// Guard that releases one hold of a [`ReentrantLock`] when dropped
///
/// Not `Send`: the hold belongs to the thread that took it.
pub struct ReentrantLockGuard<'a> {
    lock: &'a ReentrantLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReentrantLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
