//! # relay-pool
//!
//! Bounded pool of reusable SMTP transport connections.
//!
//! The pool hands out exclusive leases on connections created by a
//! [`SessionFactory`](relay_transport::SessionFactory), takes them back when
//! the lease ends, and evicts connections that failed, hit their message cap
//! or sat idle too long.
//!
//! ## Features
//!
//! - Healthy connections never exceed `max_pool_size`
//! - Lease polling bounded by both an attempt count and a wait budget,
//!   reported as distinct timeout causes
//! - Connections retired after [`MAX_MESSAGES_PER_CONNECTION`] messages
//! - Faulted connections closed immediately and removed by cleanup
//! - Optional background cleanup task
//! - Leases released automatically on drop
//!
//! ## Example
//!
//! ```rust,ignore
//! use relay_pool::{ConnectionPool, PoolSettings};
//!
//! let settings = PoolSettings::new()
//!     .max_pool_size(5)
//!     .max_connection_idle_time(Duration::from_secs(120))
//!     .cleanup_interval(Duration::from_secs(30));
//!
//! let pool = ConnectionPool::new(settings, session_config, engine).await?;
//! let client = pool.lease().await?;
//! let receipt = client.send(&payload).await?;
//! // The lease ended with the send; the connection is back in the pool.
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pool;

pub use client::TransportClient;
pub use config::PoolSettings;
pub use error::{PoolError, TimeoutCause};
pub use lifecycle::{ConnectionMetadata, ConnectionState, MAX_MESSAGES_PER_CONNECTION};
pub use pool::{ConnectionPool, PoolBuilder, PoolMetrics, PoolStatus};
