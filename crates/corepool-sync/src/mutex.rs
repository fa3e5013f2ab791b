//! Data-carrying reentrant mutex
//!
//! Wraps a [`ReentrantLock`] around a value. Because the owning thread may
//! hold several guards at once, guards only hand out `&T`; use a `Cell` or
//! `RefCell` inside for mutation. Every `RefCell` borrow must end before
//! waiting on a condition, since another thread takes the lock meanwhile.

use crate::condition::Condition;
use crate::error::SyncResult;
use crate::lock::ReentrantLock;
use core::cell::UnsafeCell;
use core::ops::Deref;
use std::fmt;
use std::marker::PhantomData;

/// A reentrant mutex protecting a value
///
/// # Example
///
/// ```
/// use corepool_sync::ReentrantMutex;
/// use std::cell::RefCell;
///
/// let mutex = ReentrantMutex::new(RefCell::new(Vec::new()));
/// let outer = mutex.lock();
/// outer.borrow_mut().push(1);
/// {
///     let inner = mutex.lock(); // same thread: no deadlock
///     inner.borrow_mut().push(2);
/// }
/// assert_eq!(*outer.borrow(), vec![1, 2]);
/// ```
pub struct ReentrantMutex<T> {
    lock: ReentrantLock,
    data: UnsafeCell<T>,
}

// Safety: access to T is serialized by the lock, and only shared
// references are handed out
unsafe impl<T: Send> Send for ReentrantMutex<T> {}
unsafe impl<T: Send> Sync for ReentrantMutex<T> {}

impl<T> ReentrantMutex<T> {
    /// Create a non-fair mutex containing `value`
    pub fn new(value: T) -> Self {
        Self::with_fairness(value, false)
    }

    /// Create a mutex with the given fairness policy
    pub fn with_fairness(value: T, fair: bool) -> Self {
        Self {
            lock: ReentrantLock::with_fairness(fair),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire the mutex, blocking until available
    pub fn lock(&self) -> ReentrantMutexGuard<'_, T> {
        self.lock.lock();
        ReentrantMutexGuard::new(self)
    }

    /// Acquire the mutex unless the calling thread is interrupted
    pub fn lock_interruptibly(&self) -> SyncResult<ReentrantMutexGuard<'_, T>> {
        self.lock.lock_interruptibly()?;
        Ok(ReentrantMutexGuard::new(self))
    }

    /// Acquire the mutex only if it is free (or already ours)
    pub fn try_lock(&self) -> Option<ReentrantMutexGuard<'_, T>> {
        if self.lock.try_lock() {
            Some(ReentrantMutexGuard::new(self))
        } else {
            None
        }
    }

    /// Create a condition variable bound to this mutex
    pub fn new_condition(&self) -> Condition {
        self.lock.new_condition()
    }

    /// The underlying lock
    pub fn raw(&self) -> &ReentrantLock {
        &self.lock
    }

    /// Whether the calling thread holds the mutex
    pub fn is_held_by_current_thread(&self) -> bool {
        self.lock.is_held_by_current_thread()
    }

    /// Mutable access without locking; `&mut self` proves exclusivity
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consume the mutex and return the inner value
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for ReentrantMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for ReentrantMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f
                .debug_struct("ReentrantMutex")
                .field("data", &*guard)
                .finish(),
            None => f
                .debug_struct("ReentrantMutex")
                .field("data", &"<locked>")
                .finish(),
        }
    }
}

/// Guard that releases one hold of the mutex when dropped
pub struct ReentrantMutexGuard<'a, T> {
    mutex: &'a ReentrantMutex<T>,
    _not_send: PhantomData<*const ()>,
}

impl<'a, T> ReentrantMutexGuard<'a, T> {
    fn new(mutex: &'a ReentrantMutex<T>) -> Self {
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }
}

impl<T> Deref for ReentrantMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: we hold the lock; only shared references exist
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> Drop for ReentrantMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_reentrant_guards() {
        let mutex = ReentrantMutex::new(Cell::new(0));
        let a = mutex.lock();
        let b = mutex.lock();
        a.set(1);
        assert_eq!(b.get(), 1);
        assert_eq!(mutex.raw().hold_count(), 2);
        drop(a);
        drop(b);
        assert!(!mutex.raw().is_locked());
    }

    #[test]
    fn test_concurrent_refcell_updates() {
        let mutex = Arc::new(ReentrantMutex::new(RefCell::new(0u32)));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&mutex);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let g = m.lock();
                        *g.borrow_mut() += 1;
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*mutex.lock().borrow(), 4000);
    }

    #[test]
    fn test_try_lock_contended() {
        let mutex = Arc::new(ReentrantMutex::new(()));
        let _g = mutex.lock();
        let m2 = Arc::clone(&mutex);
        assert!(thread::spawn(move || m2.try_lock().is_none()).join().unwrap());
    }

    #[test]
    fn test_into_inner() {
        let mut mutex = ReentrantMutex::new(41);
        *mutex.get_mut() += 1;
        assert_eq!(mutex.into_inner(), 42);
    }
}
