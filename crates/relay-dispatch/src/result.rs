//! Dispatch results and per-attempt diagnostics.

use std::time::Duration;

use relay_transport::{ErrorKind, SendReceipt};

/// Outcome of a successful dispatch.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    /// Receipt returned by the transport engine.
    pub receipt: SendReceipt,
    /// Pool connection that delivered the message.
    pub connection_id: u64,
    /// Number of attempts made, including the successful one.
    pub attempts: u32,
    /// Timings of the successful attempt.
    pub statistics: DispatchStatistics,
    /// Every attempt in order, the last one being the delivery.
    pub history: Vec<DispatchAttempt>,
}

/// Elapsed time of each dispatch step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatistics {
    /// Time spent building the payload.
    pub build_payload: Duration,
    /// Time spent waiting for a connection lease.
    pub acquire_connection: Duration,
    /// Time spent in the transport send.
    pub send: Duration,
}

impl DispatchStatistics {
    /// Total time of the attempt.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.build_payload + self.acquire_connection + self.send
    }
}

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The message was accepted.
    Delivered,
    /// The send failed with the given classification.
    Failed(ErrorKind),
}

/// One send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchAttempt {
    /// 1-based attempt number.
    pub index: u32,
    /// Time spent building the payload.
    pub build_payload: Duration,
    /// Time spent waiting for a connection lease.
    pub acquire_connection: Duration,
    /// Time spent in the transport send.
    pub send: Duration,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
}

impl DispatchAttempt {
    /// Timings of this attempt.
    #[must_use]
    pub fn statistics(&self) -> DispatchStatistics {
        DispatchStatistics {
            build_payload: self.build_payload,
            acquire_connection: self.acquire_connection,
            send: self.send,
        }
    }
}
