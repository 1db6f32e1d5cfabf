//! Transport error types.

use thiserror::Error;

use crate::classify::{ErrorKind, FailReason};
use crate::engine::RawFailure;

/// Errors raised by a transport session, already classified.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Transient failure; the send may succeed on a fresh connection.
    #[error("connection lost ({reason}): {detail}")]
    ConnectionLost {
        /// Engine failure reason.
        reason: FailReason,
        /// Engine diagnostic detail.
        detail: String,
    },

    /// Fatal failure; the session is unusable.
    #[error("transport failure ({reason}): {detail}")]
    Failure {
        /// Engine failure reason.
        reason: FailReason,
        /// Engine diagnostic detail.
        detail: String,
    },

    /// Credentials missing or rejected.
    #[error("authentication failed ({reason}): {detail}")]
    Authentication {
        /// Engine failure reason.
        reason: FailReason,
        /// Engine diagnostic detail.
        detail: String,
    },

    /// The message was rejected; the connection is still usable.
    #[error("message rejected ({reason}): {detail}")]
    InvalidMessage {
        /// Engine failure reason.
        reason: FailReason,
        /// Engine diagnostic detail.
        detail: String,
    },

    /// Session configuration is unusable.
    #[error("invalid session configuration: {0}")]
    Config(String),
}

impl TransportError {
    /// Build a classified error from an engine failure.
    #[must_use]
    pub fn from_failure(failure: RawFailure) -> Self {
        let reason = FailReason::parse(&failure.code);
        let detail = failure.detail;
        match reason.kind() {
            ErrorKind::Transient => Self::ConnectionLost { reason, detail },
            ErrorKind::Fatal => Self::Failure { reason, detail },
            ErrorKind::Authentication => Self::Authentication { reason, detail },
            ErrorKind::MessageRejected => Self::InvalidMessage { reason, detail },
        }
    }

    /// Get the error kind.
    ///
    /// Configuration errors are reported as [`ErrorKind::Fatal`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionLost { .. } => ErrorKind::Transient,
            Self::Failure { .. } | Self::Config(_) => ErrorKind::Fatal,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::InvalidMessage { .. } => ErrorKind::MessageRejected,
        }
    }

    /// Get the engine failure reason, if this error came from an engine.
    #[must_use]
    pub fn reason(&self) -> Option<&FailReason> {
        match self {
            Self::ConnectionLost { reason, .. }
            | Self::Failure { reason, .. }
            | Self::Authentication { reason, .. }
            | Self::InvalidMessage { reason, .. } => Some(reason),
            Self::Config(_) => None,
        }
    }

    /// Check if this error is transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. })
    }

    /// Check if this is a transport-layer failure (transient or fatal).
    ///
    /// These are the failures the dispatcher retries.
    #[must_use]
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. } | Self::Failure { .. })
    }

    /// Check if this is an authentication failure.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Check if the message itself was rejected.
    #[must_use]
    pub fn is_message_error(&self) -> bool {
        matches!(self, Self::InvalidMessage { .. })
    }
}

impl From<RawFailure> for TransportError {
    fn from(failure: RawFailure) -> Self {
        Self::from_failure(failure)
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
