//! Intrusive doubly-linked list of blocked threads
//!
//! Each blocked thread allocates a [`WaitNode`] on its own stack, links it
//! into a list, parks, and unlinks it (or finds it unlinked by a waker)
//! before returning. Lists are always accessed under a
//! [`SpinLock`](crate::spinlock::SpinLock); a node's link fields are only
//! read or written while that spinlock is held.
//!
//! Wakers never keep a pointer to a node past the critical section: they
//! clone the node's [`ThreadHandle`] and unpark it after unlocking. This is
//! what makes it sound for the owner to drop its node as soon as it has
//! observed, under the spinlock, that the node is no longer linked.

use crate::thread::ThreadHandle;
use std::cell::Cell;
use std::ptr;
use std::sync::Arc;

/// A blocked thread's record in a wait list
pub(crate) struct WaitNode {
    thread: Arc<ThreadHandle>,
    prev: Cell<*const WaitNode>,
    next: Cell<*const WaitNode>,
    linked: Cell<bool>,
}

impl WaitNode {
    pub(crate) fn new(thread: Arc<ThreadHandle>) -> Self {
        Self {
            thread,
            prev: Cell::new(ptr::null()),
            next: Cell::new(ptr::null()),
            linked: Cell::new(false),
        }
    }
}

impl Drop for WaitNode {
    fn drop(&mut self) {
        debug_assert!(!self.linked.get(), "wait node dropped while still linked");
    }
}

/// FIFO list of [`WaitNode`]s
pub(crate) struct WaitList {
    head: *const WaitNode,
    tail: *const WaitNode,
    len: usize,
}

// Safety: nodes are only touched while the owning SpinLock is held
unsafe impl Send for WaitList {}

impl WaitList {
    pub(crate) const fn new() -> Self {
        Self {
            head: ptr::null(),
            tail: ptr::null(),
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a node at the tail
    ///
    /// # Safety
    ///
    /// `node` must not be moved or dropped until it has been observed as
    /// unlinked under the same spinlock that guards this list.
    pub(crate) unsafe fn push_back(&mut self, node: &WaitNode) {
        debug_assert!(!node.linked.get());
        let node_ptr = node as *const WaitNode;
        node.prev.set(self.tail);
        node.next.set(ptr::null());
        if self.tail.is_null() {
            self.head = node_ptr;
        } else {
            (*self.tail).next.set(node_ptr);
        }
        self.tail = node_ptr;
        node.linked.set(true);
        self.len += 1;
    }

    /// Whether `node` is still linked into a list
    #[inline]
    pub(crate) fn is_linked(&self, node: &WaitNode) -> bool {
        node.linked.get()
    }

    /// Unlink `node` if it is still linked. Returns whether it was.
    ///
    /// # Safety
    ///
    /// If linked, `node` must be linked into this list.
    pub(crate) unsafe fn remove(&mut self, node: &WaitNode) -> bool {
        if !node.linked.get() {
            return false;
        }
        let prev = node.prev.get();
        let next = node.next.get();
        if prev.is_null() {
            self.head = next;
        } else {
            (*prev).next.set(next);
        }
        if next.is_null() {
            self.tail = prev;
        } else {
            (*next).prev.set(prev);
        }
        node.prev.set(ptr::null());
        node.next.set(ptr::null());
        node.linked.set(false);
        self.len -= 1;
        true
    }

    /// Unlink the head node and return its thread
    pub(crate) fn pop_front(&mut self) -> Option<Arc<ThreadHandle>> {
        if self.head.is_null() {
            return None;
        }
        // Safety: a linked head is alive until its owner sees it unlinked,
        // which cannot happen before we release the spinlock
        unsafe {
            let node = &*self.head;
            let thread = Arc::clone(&node.thread);
            self.remove(node);
            Some(thread)
        }
    }

    /// Thread of the head node, without unlinking it
    pub(crate) fn front(&self) -> Option<&Arc<ThreadHandle>> {
        if self.head.is_null() {
            None
        } else {
            // Safety: see pop_front
            unsafe { Some(&(*self.head).thread) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread;

    fn ids(list: &mut WaitList) -> Vec<u64> {
        let mut out = Vec::new();
        while let Some(t) = list.pop_front() {
            out.push(t.id());
        }
        out
    }

    #[test]
    fn test_fifo_order() {
        let me = thread::current();
        let a = WaitNode::new(Arc::clone(&me));
        let b = WaitNode::new(Arc::clone(&me));
        let c = WaitNode::new(Arc::clone(&me));
        let mut list = WaitList::new();

        unsafe {
            list.push_back(&a);
            list.push_back(&b);
            list.push_back(&c);
        }
        assert_eq!(list.len(), 3);
        assert_eq!(list.front().map(|t| t.id()), Some(me.id()));

        assert!(list.pop_front().is_some());
        assert!(!list.is_linked(&a));
        assert!(list.is_linked(&b));
        assert_eq!(ids(&mut list).len(), 2);
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_middle_and_ends() {
        let t1 = thread::current();
        let t2 = std::thread::spawn(thread::current).join().unwrap();
        let t3 = std::thread::spawn(thread::current).join().unwrap();
        let a = WaitNode::new(Arc::clone(&t1));
        let b = WaitNode::new(Arc::clone(&t2));
        let c = WaitNode::new(Arc::clone(&t3));
        let mut list = WaitList::new();

        unsafe {
            list.push_back(&a);
            list.push_back(&b);
            list.push_back(&c);

            assert!(list.remove(&b));
            assert!(!list.remove(&b));
            assert_eq!(list.len(), 2);

            assert!(list.remove(&c));
            assert_eq!(list.front().map(|t| t.id()), Some(t1.id()));

            list.push_back(&b);
        }
        assert_eq!(ids(&mut list), vec![t1.id(), t2.id()]);
    }
}
