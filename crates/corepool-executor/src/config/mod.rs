//! Executor configuration
//!
//! Provides compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (`from_env()` only)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust
//! use corepool_executor::ExecutorConfig;
//! use std::time::Duration;
//!
//! let config = ExecutorConfig::new()
//!     .core_size(4)
//!     .max_size(16)
//!     .keep_alive(Duration::from_millis(500))
//!     .queue_capacity(64);
//! assert!(config.validate().is_ok());
//! ```

pub mod defaults;

use crate::ctl;
use crate::error::ConfigError;
use corepool_sync::env::{env_get, env_get_bool, env_get_opt};
use std::time::Duration;
use tracing::info;

/// Thread pool configuration with builder pattern.
///
/// Use `from_env()` to start with compile-time defaults and apply any
/// environment variable overrides, or `new()` for the defaults alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Workers kept even when idle (unless `allow_core_timeout`)
    pub core_size: usize,
    /// Upper bound on live workers
    pub max_size: usize,
    /// How long an idle evictable worker waits for a task
    pub keep_alive: Duration,
    /// Capacity of the default task queue
    pub queue_capacity: usize,
    /// Apply `keep_alive` to core workers too
    pub allow_core_timeout: bool,
    /// Fair locking inside the default task queue
    pub fair: bool,
    /// Worker thread name prefix
    pub thread_name: String,
    /// Worker stack size in bytes; `None` uses the platform default
    pub stack_size: Option<usize>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ExecutorConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `CPOOL_CORE_SIZE` - Core worker count
    /// - `CPOOL_MAX_SIZE` - Maximum worker count
    /// - `CPOOL_KEEP_ALIVE_MS` - Idle keep-alive in milliseconds
    /// - `CPOOL_QUEUE_CAPACITY` - Task queue capacity
    /// - `CPOOL_ALLOW_CORE_TIMEOUT` - Let core workers time out (0/1)
    /// - `CPOOL_FAIR` - Fair queue locking (0/1)
    /// - `CPOOL_THREAD_NAME` - Worker thread name prefix
    /// - `CPOOL_STACK_SIZE` - Worker stack size in bytes
    pub fn from_env() -> Self {
        Self {
            core_size: env_get("CPOOL_CORE_SIZE", defaults::CORE_SIZE),
            max_size: env_get("CPOOL_MAX_SIZE", defaults::MAX_SIZE),
            keep_alive: Duration::from_millis(env_get(
                "CPOOL_KEEP_ALIVE_MS",
                defaults::KEEP_ALIVE_MS,
            )),
            queue_capacity: env_get("CPOOL_QUEUE_CAPACITY", defaults::QUEUE_CAPACITY),
            allow_core_timeout: env_get_bool(
                "CPOOL_ALLOW_CORE_TIMEOUT",
                defaults::ALLOW_CORE_TIMEOUT,
            ),
            fair: env_get_bool("CPOOL_FAIR", defaults::FAIR),
            thread_name: env_get("CPOOL_THREAD_NAME", defaults::THREAD_NAME.to_string()),
            stack_size: env_get_opt("CPOOL_STACK_SIZE"),
        }
    }

    /// Create config with explicit defaults (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            core_size: defaults::CORE_SIZE,
            max_size: defaults::MAX_SIZE,
            keep_alive: Duration::from_millis(defaults::KEEP_ALIVE_MS),
            queue_capacity: defaults::QUEUE_CAPACITY,
            allow_core_timeout: defaults::ALLOW_CORE_TIMEOUT,
            fair: defaults::FAIR,
            thread_name: defaults::THREAD_NAME.to_string(),
            stack_size: None,
        }
    }

    // Builder methods

    pub fn core_size(mut self, n: usize) -> Self {
        self.core_size = n;
        self
    }

    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    pub fn keep_alive(mut self, d: Duration) -> Self {
        self.keep_alive = d;
        self
    }

    pub fn queue_capacity(mut self, cap: usize) -> Self {
        self.queue_capacity = cap;
        self
    }

    pub fn allow_core_timeout(mut self, allow: bool) -> Self {
        self.allow_core_timeout = allow;
        self
    }

    pub fn fair(mut self, fair: bool) -> Self {
        self.fair = fair;
        self
    }

    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::InvalidValue("max_size must be > 0"));
        }
        if self.max_size > ctl::CAPACITY {
            return Err(ConfigError::InvalidValue("max_size exceeds worker capacity"));
        }
        if self.core_size > self.max_size {
            return Err(ConfigError::InvalidValue("core_size must be <= max_size"));
        }
        if self.keep_alive.is_zero() {
            return Err(ConfigError::InvalidValue("keep_alive must be > 0"));
        }
        if self.thread_name.contains('\0') {
            return Err(ConfigError::InvalidValue("thread_name must not contain NUL"));
        }
        if self.stack_size == Some(0) {
            return Err(ConfigError::InvalidValue("stack_size must be > 0"));
        }
        Ok(())
    }

    /// Emit the configuration as an `info!` event
    pub fn log(&self) {
        info!(
            core_size = self.core_size,
            max_size = self.max_size,
            keep_alive_ms = self.keep_alive.as_millis() as u64,
            queue_capacity = self.queue_capacity,
            allow_core_timeout = self.allow_core_timeout,
            fair = self.fair,
            thread_name = %self.thread_name,
            stack_size = ?self.stack_size,
            "executor configuration"
        );
    }
}
