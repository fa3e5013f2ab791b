//! # corepool - Blocking primitives and a thread pool executor
//!
//! ## Features
//!
//! - **Reentrant locking**: fair or barging `ReentrantLock`, data-carrying `ReentrantMutex`
//! - **Conditions**: any number of wait sets per lock, interruptible and timed waits
//! - **Bounded queue**: `ArrayBlockingQueue` with blocking, timed and non-blocking operations
//! - **Executor**: core/max worker sizing, keep-alive eviction, pluggable rejection policies
//! - **Interruption**: cooperative per-thread interrupt flag honoured by every blocking call
//!
//! ## Quick Start
//!
//! ```no_run
//! use corepool::prelude::*;
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     corepool::init_logging();
//!
//!     let pool = ThreadPoolExecutor::new(ExecutorConfig::from_env())?;
//!     pool.execute(|| println!("hello from the pool"))?;
//!
//!     let answer = pool.submit_callable(|| 6 * 7)?;
//!     println!("answer = {:?}", answer.get());
//!
//!     pool.shutdown();
//!     pool.await_termination(Duration::from_secs(5))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │        execute(), submit_callable(), shutdown()             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ThreadPoolExecutor                         │
//! │    control word, worker registry, rejection policy          │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌─────────────┐     ┌───────────┐
//!    │  Worker   │ ◄──  │ Blocking    │ ──► │  Worker   │
//!    │  Thread   │      │ Queue       │     │  Thread   │
//!    └───────────┘      └─────────────┘     └───────────┘
//!                              │
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │        ReentrantLock + Condition + parking              │
//!    │          futex on Linux, Condvar elsewhere              │
//!    └─────────────────────────────────────────────────────────┘
//! ```

// Re-export synchronization types
pub use corepool_sync::{
    current,
    current_id,
    interrupted,
    ThreadHandle,
    ReentrantLock,
    ReentrantLockGuard,
    Condition,
    ReentrantMutex,
    ReentrantMutexGuard,
    ArrayBlockingQueue,
    BlockingQueue,
    OfferError,
    SyncError,
    SyncResult,
};

// Re-export env utilities
pub use corepool_sync::{env_get, env_get_bool, env_get_opt};

// Re-export executor types
pub use corepool_executor::{
    ThreadPoolExecutor,
    ExecutorBuilder,
    ExecutorConfig,
    RunState,
    TaskHandle,
    Job,
    Task,
    ExecError,
    ExecResult,
    ConfigError,
    TaskError,
    RejectionPolicy,
    AbortPolicy,
    CallerRunsPolicy,
    DiscardPolicy,
    DiscardOldestPolicy,
    BlockPolicy,
    ThreadFactory,
    DefaultThreadFactory,
    UnstartedThread,
    ThreadBody,
};

pub mod prelude {
    //! The types most programs need
    pub use crate::{
        ArrayBlockingQueue, BlockingQueue, Condition, ExecutorConfig, ReentrantLock,
        ReentrantMutex, TaskHandle, ThreadPoolExecutor,
    };
}

/// Install a `tracing` subscriber that writes to stderr
///
/// The filter comes from `RUST_LOG` (default `info`). Does nothing if a
/// global subscriber is already set.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init();
}
