//! Fallback parker using std::sync::Condvar
//!
//! Used on platforms without futex support, and always compiled so it can
//! be tested everywhere. Less efficient but portable.

use super::Park;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Condvar-based parker
pub struct FallbackParker {
    /// Permit flag
    permit: Mutex<bool>,

    /// Condition variable the owner sleeps on
    condvar: Condvar,
}

impl FallbackParker {
    /// Create a parker with no permit
    pub fn new() -> Self {
        Self {
            permit: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }
}

impl Default for FallbackParker {
    fn default() -> Self {
        Self::new()
    }
}

impl Park for FallbackParker {
    fn park(&self, timeout: Option<Duration>) -> bool {
        let mut permit = self.permit.lock().unwrap_or_else(PoisonError::into_inner);

        // A deadline past the end of `Instant` is no deadline
        match timeout.and_then(|t| Instant::now().checked_add(t)) {
            None => {
                while !*permit {
                    permit = self
                        .condvar
                        .wait(permit)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            Some(deadline) => {
                while !*permit {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    permit = self
                        .condvar
                        .wait_timeout(permit, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }

        *permit = false;
        true
    }

    fn unpark(&self) {
        {
            let mut permit = self.permit.lock().unwrap_or_else(PoisonError::into_inner);
            *permit = true;
        }
        self.condvar.notify_one();
    }
}
