//! # relay-transport
//!
//! Capability surface between the relay connection pool and an SMTP
//! protocol engine.
//!
//! This crate does not speak SMTP itself. It defines what the pool needs
//! from an engine (open a session, send a payload, validate, close), the
//! per-session configuration handed to the engine, and the classification
//! of engine failure codes into the error kinds that drive retry and
//! connection health decisions.
//!
//! ## Failure classes
//!
//! | Kind | Examples | Retried by dispatch | Retires connection |
//! |------|----------|---------------------|--------------------|
//! | Transient | `ConnectionLost`, `Timeout` | yes | yes |
//! | Fatal | `ConnectFailed`, `StartTlsFailed` | yes | yes |
//! | Authentication | `AuthFailure`, `NoCredentials` | no | yes |
//! | Message rejected | `NoValidRecipients`, unknown codes | no | no |
//!
//! ## Example
//!
//! ```rust
//! use relay_transport::{ErrorKind, RawFailure, TransportError, classify};
//!
//! assert_eq!(classify("ConnectionLost"), ErrorKind::Transient);
//!
//! let err = TransportError::from_failure(RawFailure::new("AuthFailure", "535 5.7.8"));
//! assert!(err.is_authentication());
//! assert!(!err.is_transport_failure());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;

pub use classify::{ErrorKind, FailReason, classify};
pub use config::{AuthMethod, Credentials, Encryption, SessionConfig};
pub use engine::{Payload, RawFailure, SendReceipt, SessionFactory, TransportSession};
pub use error::TransportError;
