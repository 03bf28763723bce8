//! Lock error types.

use thiserror::Error;

/// Result type for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;

/// Distributed lock errors.
#[derive(Debug, Error)]
pub enum LockError {
    /// The key is already held by another owner.
    #[error("lock '{0}' is held by another owner")]
    AlreadyLocked(String),

    /// The stored token no longer matches this lock; the lease expired or
    /// was reassigned. Release must never report success in this case.
    #[error("lock not held by this token (expired or reassigned)")]
    NotHeld,

    /// Lease renewal found a different token under the key.
    #[error("lease renewal lost: stored token no longer matches")]
    RefreshLost,

    /// A refresher is already running for this lock.
    #[error("a refresher is already running for this lock")]
    RefresherRunning,

    /// The refresh interval does not fit the lease durations.
    #[error("invalid refresh interval: {0}")]
    InvalidInterval(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// A store call exceeded its command timeout.
    #[error("operation timed out")]
    Timeout,

    /// Underlying Redis error.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl LockError {
    /// Check if this error is a transient transport failure worth retrying.
    ///
    /// Conflicts (`AlreadyLocked`, `NotHeld`, `RefreshLost`) are definitive
    /// and never retryable: blind retries could paper over a rival holder.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::Redis(e) => e.is_io_error() || e.is_timeout() || e.is_connection_dropped(),
            _ => false,
        }
    }

    /// Check if this error proves the lock is no longer held.
    ///
    /// Transport failures deliberately return `false` here: losing
    /// connectivity leaves the holder in an unknown state, not a
    /// definitely-lost one.
    pub fn is_ownership_loss(&self) -> bool {
        matches!(self, Self::NotHeld | Self::RefreshLost)
    }
}
