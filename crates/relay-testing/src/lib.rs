//! # relay-testing
//!
//! Test infrastructure for the relay crates.
//!
//! This crate provides an in-memory transport engine with scripted
//! outcomes, so pool and dispatch behavior can be exercised without a
//! real SMTP server.
//!
//! ## Features
//!
//! - Scripted send, validation and connect outcomes using engine failure codes
//! - Session creation refusal to simulate an unreachable server
//! - Optional per-send delay to hold leases open under paused time
//! - Counters for sessions created, messages delivered and closes per session
//! - Fixture helpers for session configs and payloads
//!
//! ## Example
//!
//! ```rust,ignore
//! use relay_testing::{MockOutcome, MockTransport};
//!
//! #[tokio::test]
//! async fn test_with_mock_transport() {
//!     let transport = MockTransport::builder()
//!         .with_send_outcome(MockOutcome::fail("Timeout"))
//!         .with_send_outcome(MockOutcome::Deliver)
//!         .build();
//!
//!     let pool = ConnectionPool::new(settings, config, transport.factory()).await.unwrap();
//!     // ...
//!     assert_eq!(transport.messages_delivered(), 1);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_transport;

pub use mock_transport::{MockOutcome, MockTransport, MockTransportBuilder};
