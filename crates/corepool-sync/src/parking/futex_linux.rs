//! Linux futex-based parker
//!
//! Futex word semantics:
//! - 0 = no permit (owner may sleep)
//! - 1 = permit available
//!
//! `park` swaps the word to 0; if it was 1 the permit is consumed and the
//! call returns. Otherwise the owner sleeps in `FUTEX_WAIT` as long as the
//! word is still 0. `unpark` swaps the word to 1 and issues `FUTEX_WAKE`
//! when it was 0.

use super::Park;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const EMPTY: u32 = 0;
const NOTIFIED: u32 = 1;

/// Futex-backed single-owner parker
pub struct FutexParker {
    /// Futex word: 0 = no permit, 1 = permit available
    futex: AtomicU32,
}

impl FutexParker {
    /// Create a parker with no permit
    pub const fn new() -> Self {
        Self {
            futex: AtomicU32::new(EMPTY),
        }
    }

    fn futex_wait(&self, timeout: Option<Duration>) {
        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });

        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        // Result is ignored: ETIMEDOUT, EAGAIN (word already changed) and
        // EINTR all resolve to "re-check the word".
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                EMPTY,
                timespec_ptr,
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn futex_wake(&self) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                1i32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexParker {
    fn default() -> Self {
        Self::new()
    }
}

impl Park for FutexParker {
    fn park(&self, timeout: Option<Duration>) -> bool {
        if self.futex.swap(EMPTY, Ordering::Acquire) == NOTIFIED {
            return true;
        }
        if timeout == Some(Duration::ZERO) {
            return false;
        }

        self.futex_wait(timeout);

        self.futex.swap(EMPTY, Ordering::Acquire) == NOTIFIED
    }

    fn unpark(&self) {
        if self.futex.swap(NOTIFIED, Ordering::Release) == EMPTY {
            self.futex_wake();
        }
    }
}

// Safety: FutexParker only contains an atomic
unsafe impl Send for FutexParker {}
unsafe impl Sync for FutexParker {}
