//! Compiled-in executor defaults
//!
//! Each value can be overridden at runtime through the matching `CPOOL_*`
//! environment variable (see [`ExecutorConfig::from_env`](super::ExecutorConfig::from_env)).

/// Workers kept alive even when idle
pub const CORE_SIZE: usize = 20;

/// Hard ceiling on concurrently live workers
pub const MAX_SIZE: usize = 200;

/// Idle time before a non-core worker exits
pub const KEEP_ALIVE_MS: u64 = 3000;

/// Pending-task queue capacity
pub const QUEUE_CAPACITY: usize = 1024;

/// Let core workers time out as well
pub const ALLOW_CORE_TIMEOUT: bool = false;

/// Fair (FIFO) locking inside the task queue
pub const FAIR: bool = false;

/// Worker thread name prefix; threads are named `<prefix>-<n>`
pub const THREAD_NAME: &str = "corepool-worker";
