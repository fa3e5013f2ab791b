//! Packed run state and worker count
//!
//! One `AtomicI32` holds both fields so that transitions which must be
//! observed together happen in a single CAS:
//!
//! ```text
//!   bit 31..29   run state   RUNNING < SHUTDOWN < STOP < TIDYING < TERMINATED
//!   bit 28..0    worker count
//! ```
//!
//! RUNNING is the only negative state, so "is running" is `c < SHUTDOWN`
//! and run states compare as plain integers. The run state only ever
//! moves forward.

use std::sync::atomic::{AtomicI32, Ordering};

const COUNT_BITS: u32 = i32::BITS - 3;

/// Largest representable worker count
pub const CAPACITY: usize = (1 << COUNT_BITS) - 1;

const COUNT_MASK: i32 = (1 << COUNT_BITS) - 1;

const RUNNING: i32 = -1 << COUNT_BITS;
const SHUTDOWN: i32 = 0;
const STOP: i32 = 1 << COUNT_BITS;
const TIDYING: i32 = 2 << COUNT_BITS;
const TERMINATED: i32 = 3 << COUNT_BITS;

/// Executor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    /// Accepting and running tasks
    Running,
    /// No new tasks; queued tasks still drain
    Shutdown,
    /// Reserved: no new tasks, queue abandoned, running tasks interrupted
    Stop,
    /// All workers gone; termination in progress
    Tidying,
    /// Terminal
    Terminated,
}

impl RunState {
    const fn bits(self) -> i32 {
        match self {
            RunState::Running => RUNNING,
            RunState::Shutdown => SHUTDOWN,
            RunState::Stop => STOP,
            RunState::Tidying => TIDYING,
            RunState::Terminated => TERMINATED,
        }
    }
}

#[inline]
pub(crate) fn run_state_of(c: i32) -> RunState {
    match c & !COUNT_MASK {
        RUNNING => RunState::Running,
        SHUTDOWN => RunState::Shutdown,
        STOP => RunState::Stop,
        TIDYING => RunState::Tidying,
        _ => RunState::Terminated,
    }
}

#[inline]
pub(crate) fn worker_count_of(c: i32) -> usize {
    (c & COUNT_MASK) as usize
}

#[inline]
pub(crate) fn ctl_of(rs: RunState, wc: usize) -> i32 {
    debug_assert!(wc <= CAPACITY);
    rs.bits() | wc as i32
}

#[inline]
pub(crate) fn is_running(c: i32) -> bool {
    c < SHUTDOWN
}

#[inline]
pub(crate) fn run_state_at_least(c: i32, rs: RunState) -> bool {
    c >= rs.bits()
}

/// The control word
pub(crate) struct Ctl(AtomicI32);

impl Ctl {
    pub(crate) fn new() -> Self {
        Ctl(AtomicI32::new(ctl_of(RunState::Running, 0)))
    }

    #[inline]
    pub(crate) fn get(&self) -> i32 {
        self.0.load(Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn set(&self, c: i32) {
        self.0.store(c, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn compare_and_set(&self, expect: i32, new: i32) -> bool {
        self.0
            .compare_exchange(expect, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// CAS the worker count up by one from `expect`
    #[inline]
    pub(crate) fn compare_and_increment(&self, expect: i32) -> bool {
        self.compare_and_set(expect, expect + 1)
    }

    /// CAS the worker count down by one from `expect`
    #[inline]
    pub(crate) fn compare_and_decrement(&self, expect: i32) -> bool {
        self.compare_and_set(expect, expect - 1)
    }

    /// Decrement the worker count, retrying until it sticks
    pub(crate) fn decrement_worker_count(&self) {
        let mut c = self.get();
        while !self.compare_and_decrement(c) {
            c = self.get();
        }
    }

    /// Move the run state forward to at least `target`, keeping the count
    pub(crate) fn advance_run_state(&self, target: RunState) {
        loop {
            let c = self.get();
            if run_state_at_least(c, target)
                || self.compare_and_set(c, ctl_of(target, worker_count_of(c)))
            {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing() {
        let c = ctl_of(RunState::Running, 7);
        assert_eq!(run_state_of(c), RunState::Running);
        assert_eq!(worker_count_of(c), 7);
        assert!(is_running(c));

        let c = ctl_of(RunState::Shutdown, CAPACITY);
        assert_eq!(run_state_of(c), RunState::Shutdown);
        assert_eq!(worker_count_of(c), CAPACITY);
        assert!(!is_running(c));

        let c = ctl_of(RunState::Terminated, 0);
        assert_eq!(run_state_of(c), RunState::Terminated);
        assert!(run_state_at_least(c, RunState::Tidying));
    }

    #[test]
    fn test_states_are_ordered() {
        let states = [
            RunState::Running,
            RunState::Shutdown,
            RunState::Stop,
            RunState::Tidying,
            RunState::Terminated,
        ];
        for pair in states.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(ctl_of(pair[0], CAPACITY) < ctl_of(pair[1], 0));
        }
    }

    #[test]
    fn test_count_and_advance() {
        let ctl = Ctl::new();
        let c = ctl.get();
        assert!(ctl.compare_and_increment(c));
        assert!(!ctl.compare_and_increment(c), "stale expectation");
        let c = ctl.get();
        assert!(ctl.compare_and_increment(c));
        assert_eq!(worker_count_of(ctl.get()), 2);

        ctl.advance_run_state(RunState::Shutdown);
        assert_eq!(run_state_of(ctl.get()), RunState::Shutdown);
        assert_eq!(worker_count_of(ctl.get()), 2);

        // Never moves backward
        ctl.advance_run_state(RunState::Running);
        assert_eq!(run_state_of(ctl.get()), RunState::Shutdown);

        ctl.decrement_worker_count();
        assert_eq!(worker_count_of(ctl.get()), 1);
    }
}
