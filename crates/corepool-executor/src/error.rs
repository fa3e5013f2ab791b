//! Executor error types

use corepool_sync::SyncError;
use std::io;

/// Result type for executor operations
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors returned by [`ThreadPoolExecutor`](crate::ThreadPoolExecutor)
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The rejection policy refused the task
    #[error("task rejected: {reason}")]
    Rejected { reason: String },

    /// Invalid construction parameters
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The OS refused to start a worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    /// A blocking step was interrupted or timed out
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl ExecError {
    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        ExecError::Rejected {
            reason: reason.into(),
        }
    }

    /// Whether this error came from a rejection policy
    pub fn is_rejected(&self) -> bool {
        matches!(self, ExecError::Rejected { .. })
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    InvalidValue(&'static str),
}

/// Why a [`TaskHandle`](crate::TaskHandle) produced no value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The task panicked; carries the panic message
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was cancelled, rejected or dropped before it ran
    #[error("task cancelled")]
    Cancelled,

    /// The timed wait elapsed first
    #[error("timed out waiting for task")]
    Timeout,

    /// The waiting thread was interrupted
    #[error("interrupted waiting for task")]
    Interrupted,

    /// The result was already taken through this handle
    #[error("task result already taken")]
    Consumed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = ExecError::rejected("pool saturated");
        assert!(e.is_rejected());
        assert_eq!(e.to_string(), "task rejected: pool saturated");

        let e: ExecError = ConfigError::InvalidValue("max_size must be > 0").into();
        assert_eq!(e.to_string(), "invalid config: max_size must be > 0");

        let e: ExecError = SyncError::Interrupted.into();
        assert!(!e.is_rejected());
        assert_eq!(TaskError::Panicked("boom".into()).to_string(), "task panicked: boom");
    }
}
