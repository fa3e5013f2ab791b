//! Thread parking
//!
//! Every [`ThreadHandle`](crate::thread::ThreadHandle) owns exactly one
//! parker. A parker carries at most one wake-up permit:
//!
//! - `unpark()` stores the permit and wakes the owner if it is sleeping.
//! - `park()` consumes a stored permit and returns immediately, otherwise
//!   sleeps until unparked or until the timeout elapses.
//!
//! Spurious returns are allowed. Every caller re-checks its own condition
//! after `park()` returns and parks again if needed.
//!
//! Platform-specific implementations use the most efficient primitive
//! available (futex on Linux, `Mutex` + `Condvar` elsewhere).

use std::time::Duration;

/// Per-thread sleep/wake primitive
pub trait Park: Send + Sync {
    /// Block the calling thread until a permit is available or `timeout`
    /// elapses (`None` waits forever).
    ///
    /// Returns `true` if a permit was consumed, `false` on timeout or
    /// spurious wake-up.
    fn park(&self, timeout: Option<Duration>) -> bool;

    /// Make a permit available, waking the parked owner if any.
    ///
    /// Permits do not accumulate: unparking twice before a park still
    /// releases only one `park()` call.
    fn unpark(&self);
}

mod fallback;
pub use fallback::FallbackParker;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParker;
        /// Parker used by thread handles on this platform
        pub type Parker = FutexParker;
    } else {
        /// Parker used by thread handles on this platform
        pub type Parker = FallbackParker;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn check_timeout<P: Park>(parker: &P) {
        let start = Instant::now();
        let woken = parker.park(Some(Duration::from_millis(50)));
        assert!(!woken);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    fn check_permit_before_park<P: Park>(parker: &P) {
        parker.unpark();
        parker.unpark();
        let start = Instant::now();
        assert!(parker.park(Some(Duration::from_secs(5))));
        assert!(start.elapsed() < Duration::from_secs(1));
        // The second unpark did not leave another permit behind
        assert!(!parker.park(Some(Duration::from_millis(20))));
    }

    fn check_cross_thread<P: Park + 'static>(parker: Arc<P>) {
        let p2 = Arc::clone(&parker);
        let handle = thread::spawn(move || p2.park(Some(Duration::from_secs(10))));
        thread::sleep(Duration::from_millis(50));
        parker.unpark();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_platform_parker() {
        let parker = Parker::new();
        check_timeout(&parker);
        check_permit_before_park(&parker);
        check_cross_thread(Arc::new(Parker::new()));
    }

    #[test]
    fn test_fallback_parker() {
        let parker = FallbackParker::new();
        check_timeout(&parker);
        check_permit_before_park(&parker);
        check_cross_thread(Arc::new(FallbackParker::new()));
    }
}
