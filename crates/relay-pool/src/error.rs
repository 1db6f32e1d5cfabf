//! Pool error types.

use std::time::Duration;

use thiserror::Error;

/// Why a lease timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutCause {
    /// The wall-clock wait budget (or caller deadline) ran out.
    WaitExhausted,
    /// Every selection attempt was used without success.
    RetriesExhausted,
}

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The wait budget or the caller's deadline expired before a
    /// connection became available.
    #[error("unable to obtain a connection: wait time exhausted after {waited:?}")]
    WaitTimeout {
        /// Time spent waiting.
        waited: Duration,
    },

    /// All selection attempts failed before the wait budget expired.
    #[error("unable to obtain a connection after {attempts} attempts")]
    RetriesExhausted {
        /// Number of selection attempts made.
        attempts: u32,
    },

    /// The caller cancelled the lease.
    #[error("connection lease cancelled")]
    Cancelled,

    /// Pool is closed.
    #[error("pool is closed")]
    Closed,

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}

impl PoolError {
    /// Check if this is a lease timeout (either cause).
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.timeout_cause().is_some()
    }

    /// Get the cause of a lease timeout.
    #[must_use]
    pub fn timeout_cause(&self) -> Option<TimeoutCause> {
        match self {
            Self::WaitTimeout { .. } => Some(TimeoutCause::WaitExhausted),
            Self::RetriesExhausted { .. } => Some(TimeoutCause::RetriesExhausted),
            _ => None,
        }
    }
}
