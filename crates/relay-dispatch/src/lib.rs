//! # relay-dispatch
//!
//! Retrying message dispatch over a pooled SMTP transport.
//!
//! A [`DispatchCoordinator`] turns an [`EmailMessage`] into a payload,
//! leases a connection from a [`ConnectionSource`] (normally a
//! [`relay_pool::ConnectionPool`]) and sends it, retrying transport
//! failures a bounded number of times.
//!
//! ## Retry policy
//!
//! | Failure | Retried | Connection |
//! |---------|---------|------------|
//! | Transient (connection lost, timeout) | Yes | Faulted |
//! | Fatal (connect failed, TLS failed) | Yes | Faulted |
//! | Authentication | No | Faulted |
//! | Message rejected | No | Released |
//! | Lease timeout | No | - |
//! | Payload error | No | - |
//!
//! ## Example
//!
//! ```rust,ignore
//! use relay_dispatch::{DispatchConfig, DispatchCoordinator, EmailMessage};
//!
//! let dispatcher = DispatchCoordinator::with_pool(
//!     pool,
//!     DispatchConfig::new("bounces@example.com").max_tries(3),
//! )?;
//!
//! let mut message = EmailMessage::new("news@example.com", "Hello", "Hi there")
//!     .to("reader@example.com");
//! let result = dispatcher.send(&mut message).await?;
//! println!("delivered after {} attempt(s)", result.attempts);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod message;
pub mod result;

pub use config::DispatchConfig;
pub use coordinator::{ConnectionSource, DispatchCoordinator};
pub use error::{DispatchError, PayloadError};
pub use message::{EmailMessage, MimePayloadBuilder, PayloadBuilder};
pub use result::{AttemptOutcome, DispatchAttempt, DispatchResult, DispatchStatistics};
