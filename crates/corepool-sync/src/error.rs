//! Error types for locks and queues

use core::fmt;

/// Result type for blocking operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors returned by blocking lock, condition and queue operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The waiting thread was interrupted
    #[error("operation interrupted")]
    Interrupted,

    /// A timed wait elapsed before the operation could complete
    #[error("operation timed out")]
    Timeout,

    /// A removal was attempted on an empty queue
    #[error("queue empty")]
    Empty,
}

/// Error returned by queue insertions, handing the element back
#[derive(Clone, PartialEq, Eq)]
pub enum OfferError<T> {
    /// The queue stayed full (immediately, or for the whole timeout)
    Full(T),

    /// The inserting thread was interrupted while waiting for space
    Interrupted(T),
}

impl<T> OfferError<T> {
    /// Recover the element that could not be inserted
    pub fn into_inner(self) -> T {
        match self {
            OfferError::Full(e) | OfferError::Interrupted(e) => e,
        }
    }

    /// Whether the insertion failed because the queue was full
    pub fn is_full(&self) -> bool {
        matches!(self, OfferError::Full(_))
    }

    /// Whether the insertion failed because the caller was interrupted
    pub fn is_interrupted(&self) -> bool {
        matches!(self, OfferError::Interrupted(_))
    }
}

impl<T> fmt::Debug for OfferError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferError::Full(_) => write!(f, "Full(..)"),
            OfferError::Interrupted(_) => write!(f, "Interrupted(..)"),
        }
    }
}

impl<T> fmt::Display for OfferError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferError::Full(_) => write!(f, "queue full"),
            OfferError::Interrupted(_) => write!(f, "operation interrupted"),
        }
    }
}

impl<T> std::error::Error for OfferError<T> {}

impl<T> From<OfferError<T>> for SyncError {
    /// Drops the element; `Full` maps to `Timeout`
    fn from(e: OfferError<T>) -> Self {
        match e {
            OfferError::Full(_) => SyncError::Timeout,
            OfferError::Interrupted(_) => SyncError::Interrupted,
        }
    }
}
