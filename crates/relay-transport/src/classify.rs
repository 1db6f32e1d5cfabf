//! Failure code classification.
//!
//! Engines report failures as short textual codes. This module parses
//! them into [`FailReason`] and maps each reason onto an [`ErrorKind`].

use std::fmt;

/// Broad class of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The failure is expected to resolve itself (lost connection, timeout).
    Transient,
    /// The session is unusable (connect failure, TLS upgrade failure, ...).
    Fatal,
    /// Credentials are missing or were rejected.
    Authentication,
    /// The message itself cannot be sent as constructed.
    MessageRejected,
}

impl ErrorKind {
    /// Check if the dispatcher may retry a failure of this kind.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::Fatal)
    }

    /// Check if a send failure of this kind retires the connection.
    ///
    /// Every transport-level failure retires the connection; only
    /// message-level rejections leave it in service.
    #[must_use]
    pub fn faults_connection(&self) -> bool {
        !matches!(self, Self::MessageRejected)
    }

    /// Short lowercase label, used in log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Fatal => "fatal",
            Self::Authentication => "authentication",
            Self::MessageRejected => "message-rejected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reason reported by a transport engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailReason {
    /// The connection was lost during the operation.
    ConnectionLost,
    /// Reading or writing the socket timed out.
    Timeout,
    /// The server answered the initial greeting with an error.
    GreetingError,
    /// General failure not covered by another code.
    Failed,
    /// No server hostname was configured.
    NoSmtpHostname,
    /// TCP or TLS connection could not be established.
    ConnectFailed,
    /// Internal engine failure.
    InternalFailure,
    /// The engine component was never unlocked/licensed.
    NotUnlocked,
    /// The operation was aborted.
    Aborted,
    /// Upgrading the connection via STARTTLS failed.
    StartTlsFailed,
    /// Credentials were required but not provided.
    NoCredentials,
    /// The server rejected the login.
    AuthFailure,
    /// The server rejected every recipient.
    NoValidRecipients,
    /// The message has no recipients.
    NoRecipients,
    /// The message has no sender.
    NoFrom,
    /// Some recipients were rejected while all-or-nothing delivery was requested.
    SomeBadRecipients,
    /// The server rejected `MAIL FROM`.
    FromFailure,
    /// Rendering the message (signing, encryption) failed.
    RenderFailed,
    /// The server rejected `DATA`.
    DataFailure,
    /// Any code this crate does not recognize.
    Other(String),
}

impl FailReason {
    /// Parse an engine failure code.
    ///
    /// Unrecognized codes are preserved in [`FailReason::Other`].
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code.trim() {
            "ConnectionLost" => Self::ConnectionLost,
            "Timeout" => Self::Timeout,
            "GreetingError" => Self::GreetingError,
            "Failed" => Self::Failed,
            "NoSmtpHostname" => Self::NoSmtpHostname,
            "ConnectFailed" => Self::ConnectFailed,
            "InternalFailure" => Self::InternalFailure,
            "NotUnlocked" => Self::NotUnlocked,
            "Aborted" => Self::Aborted,
            "StartTlsFailed" => Self::StartTlsFailed,
            "NoCredentials" => Self::NoCredentials,
            "AuthFailure" => Self::AuthFailure,
            "NoValidRecipients" => Self::NoValidRecipients,
            "NoRecipients" => Self::NoRecipients,
            "NoFrom" => Self::NoFrom,
            "SomeBadRecipients" => Self::SomeBadRecipients,
            "FromFailure" => Self::FromFailure,
            "RenderFailed" => Self::RenderFailed,
            "DataFailure" => Self::DataFailure,
            other => Self::Other(other.to_string()),
        }
    }

    /// Classify this reason.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionLost | Self::Timeout | Self::GreetingError => ErrorKind::Transient,
            Self::Failed
            | Self::NoSmtpHostname
            | Self::ConnectFailed
            | Self::InternalFailure
            | Self::NotUnlocked
            | Self::Aborted
            | Self::StartTlsFailed => ErrorKind::Fatal,
            Self::NoCredentials | Self::AuthFailure => ErrorKind::Authentication,
            Self::NoValidRecipients
            | Self::NoRecipients
            | Self::NoFrom
            | Self::SomeBadRecipients
            | Self::FromFailure
            | Self::RenderFailed
            | Self::DataFailure
            | Self::Other(_) => ErrorKind::MessageRejected,
        }
    }

    /// The code as the engine reports it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ConnectionLost => "ConnectionLost",
            Self::Timeout => "Timeout",
            Self::GreetingError => "GreetingError",
            Self::Failed => "Failed",
            Self::NoSmtpHostname => "NoSmtpHostname",
            Self::ConnectFailed => "ConnectFailed",
            Self::InternalFailure => "InternalFailure",
            Self::NotUnlocked => "NotUnlocked",
            Self::Aborted => "Aborted",
            Self::StartTlsFailed => "StartTlsFailed",
            Self::NoCredentials => "NoCredentials",
            Self::AuthFailure => "AuthFailure",
            Self::NoValidRecipients => "NoValidRecipients",
            Self::NoRecipients => "NoRecipients",
            Self::NoFrom => "NoFrom",
            Self::SomeBadRecipients => "SomeBadRecipients",
            Self::FromFailure => "FromFailure",
            Self::RenderFailed => "RenderFailed",
            Self::DataFailure => "DataFailure",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for FailReason {
    fn from(code: &str) -> Self {
        Self::parse(code)
    }
}

/// Classify a raw engine failure code.
#[must_use]
pub fn classify(code: &str) -> ErrorKind {
    FailReason::parse(code).kind()
}
