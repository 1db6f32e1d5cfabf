//! Transport engine capability traits.
//!
//! The pool depends only on these traits. A concrete engine (a real SMTP
//! client, or the in-memory engine in `relay-testing`) implements
//! [`SessionFactory`] and hands out [`TransportSession`]s.

use bytes::Bytes;

use crate::config::SessionConfig;
use crate::error::TransportError;

/// Failure signal reported by an engine.
///
/// `code` is classified by [`crate::classify`]; `detail` is free-form
/// diagnostic text (for example the server's last response).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFailure {
    /// Engine failure code.
    pub code: String,
    /// Diagnostic detail.
    pub detail: String,
}

impl RawFailure {
    /// Create a failure with the given code and detail.
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: detail.into(),
        }
    }

    /// Create a failure with no detail text.
    pub fn code(code: impl Into<String>) -> Self {
        Self::new(code, String::new())
    }
}

/// Protocol-ready message: envelope plus rendered content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Envelope sender (`MAIL FROM`).
    pub mail_from: String,
    /// Envelope recipients (`RCPT TO`).
    pub recipients: Vec<String>,
    /// Rendered message content.
    pub data: Bytes,
}

impl Payload {
    /// Create a payload.
    pub fn new(mail_from: impl Into<String>, recipients: Vec<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mail_from: mail_from.into(),
            recipients,
            data: data.into(),
        }
    }

    /// Size of the rendered content in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the rendered content is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Engine acknowledgement of a successful send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// Final server response line.
    pub response: String,
    /// Number of recipients the server accepted.
    pub accepted_recipients: usize,
}

/// One live (or lazily connected) transport session.
///
/// Sessions are exclusively owned by whoever holds them; the pool hands a
/// session to exactly one lessee at a time, so methods take `&mut self`.
/// `#[async_trait]` keeps the trait object-safe.
#[async_trait::async_trait]
pub trait TransportSession: Send {
    /// Connect and authenticate if not already connected.
    async fn open_or_reuse(&mut self) -> Result<(), RawFailure>;

    /// Transmit one payload over the session.
    async fn send_payload(&mut self, payload: &Payload) -> Result<SendReceipt, RawFailure>;

    /// Lightweight round-trip verifying connectivity and login.
    async fn validate(&mut self) -> Result<(), RawFailure>;

    /// Close the underlying connection.
    async fn close_session(&mut self);

    /// Check if the underlying connection is open.
    fn is_connected(&self) -> bool;
}

/// Creates sessions for the pool.
///
/// Creation must not perform network I/O: the pool calls this while holding
/// its critical section. Connection happens later in
/// [`TransportSession::open_or_reuse`].
pub trait SessionFactory: Send + Sync {
    /// Create a new, not yet connected session.
    fn create_session(
        &self,
        config: &SessionConfig,
    ) -> Result<Box<dyn TransportSession>, TransportError>;
}
