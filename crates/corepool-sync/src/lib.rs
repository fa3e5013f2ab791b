//! # corepool-sync
//!
//! Blocking synchronization primitives built from atomics and thread
//! parking: the foundation the `corepool-executor` thread pool runs on.
//!
//! ## Modules
//!
//! - `parking` - Per-thread park/unpark (futex on Linux, Condvar elsewhere)
//! - `thread` - Thread handles with identity and cooperative interruption
//! - `spinlock` - Internal spinlock primitive
//! - `lock` - Reentrant lock with fair and barging acquisition
//! - `condition` - Condition variables bound to a reentrant lock
//! - `mutex` - Data-carrying reentrant mutex
//! - `queue` - Bounded blocking queue
//! - `error` - Error types
//! - `env` - Environment variable utilities

pub mod parking;
pub mod thread;
pub mod spinlock;
mod wait_list;
pub mod lock;
pub mod condition;
pub mod mutex;
pub mod queue;
pub mod error;
pub mod env;

// Re-exports for convenience
pub use thread::{current, current_id, interrupted, ThreadHandle};
pub use spinlock::{SpinLock, SpinLockGuard};
pub use lock::{ReentrantLock, ReentrantLockGuard};
pub use condition::Condition;
pub use mutex::{ReentrantMutex, ReentrantMutexGuard};
pub use queue::{ArrayBlockingQueue, BlockingQueue};
pub use error::{OfferError, SyncError, SyncResult};
pub use env::{env_get, env_get_bool, env_get_opt};
