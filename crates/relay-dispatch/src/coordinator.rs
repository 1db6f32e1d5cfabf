//! Retrying dispatch coordinator.
//!
//! The coordinator composes a [`ConnectionSource`] and a [`PayloadBuilder`].
//! Each attempt stamps the return path, builds the payload, leases a
//! connection and sends. Only transport failures (transient or fatal) are
//! retried, after a fixed non-blocking delay; every other error surfaces on
//! first occurrence.

use std::fmt;
use std::sync::Arc;

use relay_pool::{ConnectionPool, PoolError, TransportClient};
use tokio::time::Instant;

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::message::{EmailMessage, MimePayloadBuilder, PayloadBuilder};
use crate::result::{AttemptOutcome, DispatchAttempt, DispatchResult, DispatchStatistics};

/// Source of leased transport connections.
#[async_trait::async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Lease a connection.
    async fn lease(&self) -> Result<TransportClient, PoolError>;
}

#[async_trait::async_trait]
impl ConnectionSource for ConnectionPool {
    async fn lease(&self) -> Result<TransportClient, PoolError> {
        ConnectionPool::lease(self).await
    }
}

/// Sends messages over pooled connections with bounded retry.
pub struct DispatchCoordinator {
    source: Arc<dyn ConnectionSource>,
    builder: Arc<dyn PayloadBuilder>,
    config: DispatchConfig,
}

impl DispatchCoordinator {
    /// Create a coordinator from its collaborators.
    pub fn new(
        source: Arc<dyn ConnectionSource>,
        builder: Arc<dyn PayloadBuilder>,
        config: DispatchConfig,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        Ok(Self {
            source,
            builder,
            config,
        })
    }

    /// Create a coordinator over a pool using [`MimePayloadBuilder`].
    pub fn with_pool(pool: ConnectionPool, config: DispatchConfig) -> Result<Self, DispatchError> {
        Self::new(Arc::new(pool), Arc::new(MimePayloadBuilder::new()), config)
    }

    /// Get the dispatch configuration.
    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Send a message.
    ///
    /// The message's return path is overwritten with the configured one.
    pub async fn send(&self, message: &mut EmailMessage) -> Result<DispatchResult, DispatchError> {
        let max_tries = self.config.max_tries;
        let mut history = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            message.return_path = Some(self.config.return_path.clone());

            let started = Instant::now();
            let payload = self.builder.build(message)?;
            let build_payload = started.elapsed();

            let started = Instant::now();
            let client = self.source.lease().await?;
            let acquire_connection = started.elapsed();
            let connection_id = client.id();

            let started = Instant::now();
            let result = client.send(&payload).await;
            let send = started.elapsed();

            let outcome = match &result {
                Ok(_) => AttemptOutcome::Delivered,
                Err(e) => AttemptOutcome::Failed(e.kind()),
            };
            history.push(DispatchAttempt {
                index: attempt,
                build_payload,
                acquire_connection,
                send,
                outcome,
            });

            match result {
                Ok(receipt) => {
                    tracing::debug!(
                        message_id = %message.message_id,
                        connection_id,
                        attempt,
                        build_ms = build_payload.as_millis() as u64,
                        lease_ms = acquire_connection.as_millis() as u64,
                        send_ms = send.as_millis() as u64,
                        "message dispatched"
                    );
                    return Ok(DispatchResult {
                        receipt,
                        connection_id,
                        attempts: attempt,
                        statistics: DispatchStatistics {
                            build_payload,
                            acquire_connection,
                            send,
                        },
                        history,
                    });
                }
                Err(e) if e.is_transport_failure() && attempt < max_tries => {
                    tracing::warn!(
                        message_id = %message.message_id,
                        attempt,
                        max_tries,
                        error = %e,
                        delay_ms = self.config.delay.as_millis() as u64,
                        "transport failure, retrying dispatch"
                    );
                    tokio::time::sleep(self.config.delay).await;
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = %message.message_id,
                        attempt,
                        kind = %e.kind(),
                        error = %e,
                        "dispatch failed"
                    );
                    return Err(e.into());
                }
            }
        }
    }

    /// Check that a connection can be leased and validated.
    ///
    /// Retries up to `max_tries` times with the configured delay. A failed
    /// lease counts as a failed attempt.
    pub async fn validate_dispatch(&self) -> bool {
        let max_tries = self.config.max_tries;

        for attempt in 1..=max_tries {
            let valid = match self.source.lease().await {
                Ok(client) => client.validate().await,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "unable to lease connection for validation");
                    false
                }
            };

            if valid {
                return true;
            }
            if attempt < max_tries {
                tokio::time::sleep(self.config.delay).await;
            }
        }

        tracing::warn!(max_tries, "dispatch validation failed");
        false
    }
}

impl fmt::Debug for DispatchCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
