//! Bounded blocking queue
//!
//! [`ArrayBlockingQueue`] is a fixed-capacity ring buffer guarded by one
//! [`ReentrantMutex`] and two conditions derived from it:
//!
//! ```text
//!            put / offer                         take / poll
//!   ──────►  slot[put_index]   ... ring ...   slot[take_index]  ──────►
//!            signal not_empty                 signal not_full
//! ```
//!
//! Every operation holds the mutex for its whole duration except while
//! parked on a condition. Elements leave in the order they went in.
//!
//! Failed insertions hand the element back through [`OfferError`] so the
//! caller keeps ownership.

use crate::condition::Condition;
use crate::error::{OfferError, SyncError, SyncResult};
use crate::mutex::ReentrantMutex;
use std::cell::RefCell;
use std::fmt;
use std::time::Duration;

/// Blocking FIFO used by the executor for pending tasks
///
/// Implementations must be safe to share between producers and workers.
pub trait BlockingQueue<T>: Send + Sync {
    /// Insert without waiting; a full queue returns `OfferError::Full`
    fn offer(&self, item: T) -> Result<(), OfferError<T>>;

    /// Insert, waiting up to `timeout` for space
    fn offer_timeout(&self, item: T, timeout: Duration) -> Result<(), OfferError<T>>;

    /// Insert, waiting as long as it takes for space
    ///
    /// Fails only with `OfferError::Interrupted`.
    fn put(&self, item: T) -> Result<(), OfferError<T>>;

    /// Remove the head without waiting
    fn poll(&self) -> Option<T>;

    /// Remove the head, waiting up to `timeout`; `Ok(None)` on expiry
    fn poll_timeout(&self, timeout: Duration) -> SyncResult<Option<T>>;

    /// Remove the head, waiting as long as it takes
    fn take(&self) -> SyncResult<T>;

    /// Remove the first element matching `pred`
    fn remove_where(&self, pred: &mut dyn FnMut(&T) -> bool) -> Option<T>;

    /// Move every element into `sink`, returning how many moved
    fn drain_to(&self, sink: &mut Vec<T>) -> usize;

    /// Number of elements currently queued
    fn len(&self) -> usize;

    /// Fixed capacity
    fn capacity(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free slots; a snapshot that may be stale by the time it is read
    fn remaining_capacity(&self) -> usize {
        self.capacity().saturating_sub(self.len())
    }
}

/// Ring buffer state; only touched under the queue's mutex
struct Ring<T> {
    slots: Box<[Option<T>]>,
    take_index: usize,
    put_index: usize,
    count: usize,
}

impl<T> Ring<T> {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            take_index: 0,
            put_index: 0,
            count: 0,
        }
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn inc(&self, i: usize) -> usize {
        if i + 1 == self.slots.len() {
            0
        } else {
            i + 1
        }
    }

    /// Caller checks `!is_full()` first
    fn enqueue(&mut self, item: T) {
        debug_assert!(!self.is_full());
        self.slots[self.put_index] = Some(item);
        self.put_index = self.inc(self.put_index);
        self.count += 1;
    }

    fn dequeue(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.take_index].take();
        self.take_index = self.inc(self.take_index);
        self.count -= 1;
        item
    }

    fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            None
        } else {
            self.slots[self.take_index].as_ref()
        }
    }

    /// Index of the first element matching `pred`, scanning head to tail
    fn position(&self, pred: &mut dyn FnMut(&T) -> bool) -> Option<usize> {
        let mut i = self.take_index;
        for _ in 0..self.count {
            if let Some(item) = &self.slots[i] {
                if pred(item) {
                    return Some(i);
                }
            }
            i = self.inc(i);
        }
        None
    }

    /// Remove the element at `index`, shifting the tail segment down
    fn remove_at(&mut self, index: usize) -> Option<T> {
        if index == self.take_index {
            return self.dequeue();
        }
        let item = self.slots[index].take();
        let mut i = index;
        loop {
            let next = self.inc(i);
            if next == self.put_index {
                self.put_index = i;
                break;
            }
            self.slots[i] = self.slots[next].take();
            i = next;
        }
        self.count -= 1;
        item
    }
}

/// Bounded FIFO queue backed by a ring buffer
///
/// # Example
///
/// ```
/// use corepool_sync::{ArrayBlockingQueue, BlockingQueue};
///
/// let q = ArrayBlockingQueue::new(2);
/// assert!(q.offer("a").is_ok());
/// assert!(q.offer("b").is_ok());
/// assert!(q.offer("c").unwrap_err().is_full());
/// assert_eq!(q.poll(), Some("a"));
/// ```
pub struct ArrayBlockingQueue<T> {
    ring: ReentrantMutex<RefCell<Ring<T>>>,
    not_empty: Condition,
    not_full: Condition,
    capacity: usize,
}

impl<T> ArrayBlockingQueue<T> {
    /// Create a queue holding at most `capacity` elements
    ///
    /// A capacity of 0 yields a queue that is always full and always empty:
    /// every `offer` fails, every `poll` returns `None`.
    pub fn new(capacity: usize) -> Self {
        Self::with_fairness(capacity, false)
    }

    /// Create a queue whose internal lock uses the given fairness policy
    pub fn with_fairness(capacity: usize, fair: bool) -> Self {
        let ring = ReentrantMutex::with_fairness(RefCell::new(Ring::new(capacity)), fair);
        let not_empty = ring.new_condition();
        let not_full = ring.new_condition();
        Self {
            ring,
            not_empty,
            not_full,
            capacity,
        }
    }

    /// Clone of the head element, without removing it
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let g = self.ring.lock();
        let head = g.borrow().peek().cloned();
        head
    }

    /// Remove the head; an empty queue is `Err(SyncError::Empty)`
    pub fn remove(&self) -> SyncResult<T>
    where
        T: Send,
    {
        self.poll().ok_or(SyncError::Empty)
    }

    /// Drop every element, waking all blocked producers
    pub fn clear(&self) {
        let g = self.ring.lock();
        let removed = {
            let mut ring = g.borrow_mut();
            let n = ring.count;
            while ring.dequeue().is_some() {}
            n
        };
        if removed > 0 {
            self.not_full.signal_all();
        }
    }

    /// Whether the queue's lock grants access in arrival order
    pub fn is_fair(&self) -> bool {
        self.ring.raw().is_fair()
    }
}

impl<T: Send> BlockingQueue<T> for ArrayBlockingQueue<T> {
    fn offer(&self, item: T) -> Result<(), OfferError<T>> {
        let g = self.ring.lock();
        let full = g.borrow().is_full();
        if full {
            return Err(OfferError::Full(item));
        }
        g.borrow_mut().enqueue(item);
        self.not_empty.signal();
        Ok(())
    }

    fn offer_timeout(&self, item: T, timeout: Duration) -> Result<(), OfferError<T>> {
        let g = match self.ring.lock_interruptibly() {
            Ok(g) => g,
            Err(_) => return Err(OfferError::Interrupted(item)),
        };
        let mut remaining = timeout;
        while g.borrow().is_full() {
            if remaining.is_zero() {
                return Err(OfferError::Full(item));
            }
            remaining = match self.not_full.wait_timeout(remaining) {
                Ok(left) => left,
                Err(_) => return Err(OfferError::Interrupted(item)),
            };
        }
        g.borrow_mut().enqueue(item);
        self.not_empty.signal();
        Ok(())
    }

    fn put(&self, item: T) -> Result<(), OfferError<T>> {
        let g = match self.ring.lock_interruptibly() {
            Ok(g) => g,
            Err(_) => return Err(OfferError::Interrupted(item)),
        };
        while g.borrow().is_full() {
            if self.not_full.wait().is_err() {
                return Err(OfferError::Interrupted(item));
            }
        }
        g.borrow_mut().enqueue(item);
        self.not_empty.signal();
        Ok(())
    }

    fn poll(&self) -> Option<T> {
        let g = self.ring.lock();
        let item = g.borrow_mut().dequeue();
        if item.is_some() {
            self.not_full.signal();
        }
        item
    }

    fn poll_timeout(&self, timeout: Duration) -> SyncResult<Option<T>> {
        let g = self.ring.lock_interruptibly()?;
        let mut remaining = timeout;
        loop {
            let item = g.borrow_mut().dequeue();
            if let Some(item) = item {
                self.not_full.signal();
                return Ok(Some(item));
            }
            if remaining.is_zero() {
                return Ok(None);
            }
            remaining = self.not_empty.wait_timeout(remaining)?;
        }
    }

    fn take(&self) -> SyncResult<T> {
        let g = self.ring.lock_interruptibly()?;
        loop {
            let item = g.borrow_mut().dequeue();
            if let Some(item) = item {
                self.not_full.signal();
                return Ok(item);
            }
            self.not_empty.wait()?;
        }
    }

    fn remove_where(&self, pred: &mut dyn FnMut(&T) -> bool) -> Option<T> {
        let g = self.ring.lock();
        let removed = {
            let mut ring = g.borrow_mut();
            match ring.position(pred) {
                Some(i) => ring.remove_at(i),
                None => None,
            }
        };
        if removed.is_some() {
            self.not_full.signal();
        }
        removed
    }

    fn drain_to(&self, sink: &mut Vec<T>) -> usize {
        let g = self.ring.lock();
        let moved = {
            let mut ring = g.borrow_mut();
            let mut n = 0;
            while let Some(item) = ring.dequeue() {
                sink.push(item);
                n += 1;
            }
            n
        };
        if moved > 0 {
            self.not_full.signal_all();
        }
        moved
    }

    fn len(&self) -> usize {
        let g = self.ring.lock();
        let n = g.borrow().count;
        n
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> fmt::Debug for ArrayBlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = self.ring.lock();
        let len = g.borrow().count;
        f.debug_struct("ArrayBlockingQueue")
            .field("len", &len)
            .field("capacity", &self.capacity)
            .finish()
    }
}
