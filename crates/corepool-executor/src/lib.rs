//! # corepool-executor
//!
//! A dynamically sized pool of worker threads fed by a bounded blocking
//! queue. Workers grow from `core_size` up to `max_size` when the queue
//! fills, idle extras retire after `keep_alive`, and tasks that can be
//! neither run nor queued go to a pluggable rejection policy.
//!
//! ## Modules
//!
//! - `config` - Pool sizing and environment configuration
//! - `executor` - The `ThreadPoolExecutor` and its builder
//! - `future` - Result handles for submitted tasks
//! - `rejection` - Policies for tasks the pool cannot admit
//! - `task` - Queued units of work
//! - `thread_factory` - Worker thread creation
//! - `error` - Error types

pub mod config;
mod ctl;
pub mod error;
pub mod executor;
pub mod future;
pub mod rejection;
pub mod task;
pub mod thread_factory;
mod worker;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use config::ExecutorConfig;
pub use ctl::RunState;
pub use error::{ConfigError, ExecError, ExecResult, TaskError};
pub use executor::{ExecutorBuilder, ThreadPoolExecutor};
pub use future::TaskHandle;
pub use rejection::{
    AbortPolicy, BlockPolicy, CallerRunsPolicy, DiscardOldestPolicy, DiscardPolicy,
    RejectionPolicy,
};
pub use task::{Job, Task};
pub use thread_factory::{DefaultThreadFactory, ThreadBody, ThreadFactory, UnstartedThread};
