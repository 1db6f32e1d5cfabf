//! Outbound message model and payload building.
//!
//! [`EmailMessage`] is the caller's view of a message; a [`PayloadBuilder`]
//! turns it into the envelope and RFC 5322 data the transport engine sends.

use std::fmt::Write as _;

use relay_transport::Payload;

use crate::error::PayloadError;

/// An outbound email message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailMessage {
    /// Message identifier, rendered as `Message-ID` when set.
    pub message_id: String,
    /// Header `From` address.
    pub from: String,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    pub cc: Vec<String>,
    /// Blind carbon-copy recipients; never rendered as a header.
    pub bcc: Vec<String>,
    /// Reply-To address.
    pub reply_to: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Additional headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// Plain-text body.
    pub body: String,
    /// Envelope return path, stamped by the dispatcher.
    pub return_path: Option<String>,
}

impl EmailMessage {
    /// Create a message with a sender, subject and body.
    pub fn new(
        from: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Set the message identifier.
    #[must_use]
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = id.into();
        self
    }

    /// Add a To recipient.
    #[must_use]
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Add a Cc recipient.
    #[must_use]
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    /// Add a Bcc recipient.
    #[must_use]
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    /// Set the Reply-To address.
    #[must_use]
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Set a header, replacing any existing header with the same name.
    ///
    /// Header names compare case-insensitively.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(header) => header.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Get a header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All envelope recipients: To, then Cc, then Bcc.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(String::as_str)
    }

    /// Envelope sender: the return path when set, otherwise `From`.
    #[must_use]
    pub fn envelope_sender(&self) -> Option<&str> {
        self.return_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .or_else(|| Some(self.from.as_str()).filter(|from| !from.trim().is_empty()))
    }
}

/// Builds a protocol-ready payload from a message.
pub trait PayloadBuilder: Send + Sync {
    /// Build the payload.
    fn build(&self, message: &EmailMessage) -> Result<Payload, PayloadError>;
}

/// Renders a plain-text RFC 5322 message.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimePayloadBuilder;

impl MimePayloadBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PayloadBuilder for MimePayloadBuilder {
    fn build(&self, message: &EmailMessage) -> Result<Payload, PayloadError> {
        let sender = message
            .envelope_sender()
            .ok_or(PayloadError::MissingSender)?
            .to_string();

        let recipients: Vec<String> = message
            .recipients()
            .filter(|r| !r.trim().is_empty())
            .map(str::to_string)
            .collect();
        if recipients.is_empty() {
            return Err(PayloadError::MissingRecipients);
        }

        let mut data = String::with_capacity(message.body.len() + 256);
        push_header(&mut data, "From", &message.from)?;
        if !message.to.is_empty() {
            push_header(&mut data, "To", &message.to.join(", "))?;
        }
        if !message.cc.is_empty() {
            push_header(&mut data, "Cc", &message.cc.join(", "))?;
        }
        if let Some(reply_to) = message.reply_to.as_deref().filter(|r| !r.is_empty()) {
            push_header(&mut data, "Reply-To", reply_to)?;
        }
        push_header(&mut data, "Subject", &message.subject)?;
        if !message.message_id.is_empty() {
            push_header(&mut data, "Message-ID", &format!("<{}>", message.message_id))?;
        }
        for (name, value) in &message.headers {
            push_header(&mut data, name, value)?;
        }
        push_header(&mut data, "MIME-Version", "1.0")?;
        push_header(&mut data, "Content-Type", "text/plain; charset=utf-8")?;
        data.push_str("\r\n");

        for line in message.body.lines() {
            data.push_str(line);
            data.push_str("\r\n");
        }

        Ok(Payload::new(sender, recipients, data))
    }
}

fn push_header(out: &mut String, name: &str, value: &str) -> Result<(), PayloadError> {
    if name.is_empty() || name.contains([':', '\r', '\n']) || value.contains(['\r', '\n']) {
        return Err(PayloadError::InvalidHeader(name.to_string()));
    }
    // Writing to a String cannot fail.
    let _ = write!(out, "{name}: {value}\r\n");
    Ok(())
}
