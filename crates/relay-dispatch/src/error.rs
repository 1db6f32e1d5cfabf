//! Dispatch error types.

use relay_pool::PoolError;
use relay_transport::TransportError;
use thiserror::Error;

/// Errors raised while building a payload from a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Neither a return path nor a `From` address is set.
    #[error("message has no sender")]
    MissingSender,

    /// The message has no To, Cc or Bcc recipients.
    #[error("message has no recipients")]
    MissingRecipients,

    /// A header name or value contains a line break.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

/// Errors that can occur while dispatching a message.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No connection could be leased.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The transport failed or rejected the message.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The message could not be turned into a payload.
    #[error("cannot build payload: {0}")]
    Payload(#[from] PayloadError),

    /// Dispatch configuration error.
    #[error("dispatch configuration error: {0}")]
    Configuration(String),
}

impl DispatchError {
    /// Check if the dispatcher retries this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_transport_failure())
    }

    /// Check if the message itself cannot be sent as constructed.
    #[must_use]
    pub fn is_message_error(&self) -> bool {
        match self {
            Self::Payload(_) => true,
            Self::Transport(e) => e.is_message_error(),
            _ => false,
        }
    }

    /// Check if leasing a connection timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Pool(e) if e.is_timeout())
    }
}
