//! Connection lifecycle management.
//!
//! Every pooled connection carries a [`ConnectionState`] tag. The tag is
//! only changed under the pool's critical section, and cleanup partitions
//! connections purely by tag and idle age.
//!
//! ```text
//! Idle --lease--> Leased --release--> Idle
//!                   |  \--release, > MAX_MESSAGES_PER_CONNECTION--> Retired
//!                   \--transport/auth failure--> Faulted
//! Faulted | Retired --cleanup--> removed
//! ```

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Messages a connection may send before it is retired on release.
pub const MAX_MESSAGES_PER_CONNECTION: u64 = 10_000;

/// Connection state tracked by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is idle and available for use.
    Idle,
    /// Connection is leased to exactly one caller.
    Leased,
    /// Session failed and has been closed; awaiting removal.
    Faulted,
    /// Connection reached its message cap; awaiting removal.
    Retired,
}

impl ConnectionState {
    /// Check if the connection can be leased.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if the connection counts against the pool size.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Idle | Self::Leased)
    }

    /// Check if the connection is waiting to be removed by cleanup.
    #[must_use]
    pub fn is_marked_for_removal(&self) -> bool {
        matches!(self, Self::Faulted | Self::Retired)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Leased => "leased",
            Self::Faulted => "faulted",
            Self::Retired => "retired",
        })
    }
}

/// Metadata about a pooled connection.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Unique identifier for this connection.
    pub id: u64,
    /// When the connection was created.
    pub created_at: Instant,
    /// When the connection was last released (`None` until the first release).
    pub last_used_at: Option<Instant>,
    /// Number of times the connection has been leased.
    pub lease_count: u64,
    /// Number of messages successfully sent over the connection.
    pub messages_sent: u64,
    /// Current state of the connection.
    pub state: ConnectionState,
}

impl ConnectionMetadata {
    /// Create metadata for a new connection.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            created_at: Instant::now(),
            last_used_at: None,
            lease_count: 0,
            messages_sent: 0,
            state: ConnectionState::Idle,
        }
    }

    /// Check if the connection has been idle longer than `idle_timeout`.
    ///
    /// Leased connections and connections never released are not idle.
    #[must_use]
    pub fn is_idle_expired(&self, idle_timeout: Duration, now: Instant) -> bool {
        self.state == ConnectionState::Idle
            && self
                .last_used_at
                .is_some_and(|last| now.saturating_duration_since(last) > idle_timeout)
    }

    /// Check if cleanup should remove this connection.
    #[must_use]
    pub fn is_removable(&self, idle_timeout: Duration, now: Instant) -> bool {
        self.state.is_marked_for_removal() || self.is_idle_expired(idle_timeout, now)
    }

    /// Mark the connection as leased.
    pub fn mark_leased(&mut self) {
        self.lease_count += 1;
        self.state = ConnectionState::Leased;
    }

    /// Mark the connection as released.
    ///
    /// Retires the connection once it has sent more than
    /// [`MAX_MESSAGES_PER_CONNECTION`] messages.
    pub fn mark_released(&mut self) {
        self.last_used_at = Some(Instant::now());
        self.state = if self.messages_sent > MAX_MESSAGES_PER_CONNECTION {
            ConnectionState::Retired
        } else {
            ConnectionState::Idle
        };
    }

    /// Mark the connection as faulted.
    pub fn mark_faulted(&mut self) {
        self.last_used_at = Some(Instant::now());
        self.state = ConnectionState::Faulted;
    }
}
