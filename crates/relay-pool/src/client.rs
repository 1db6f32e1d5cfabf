//! Leased transport client.
//!
//! A [`TransportClient`] is an exclusive lease on one pooled session. The
//! session handle moves into the client for the duration of the lease and
//! moves back when the lease ends, so the pool never touches a session
//! that is in use.
//!
//! Every lease ends with exactly one check-in: [`TransportClient::send`]
//! and [`TransportClient::validate`] consume the client and check it in
//! themselves (released, or faulted on failure), [`TransportClient::release`]
//! checks it in explicitly, and dropping an unconsumed client releases it.
//! A client dropped while `send` or `validate` is still awaiting the engine
//! (a timed-out or cancelled future) is checked in as faulted instead, since
//! its session is stopped mid-exchange.

use std::fmt;
use std::sync::Arc;

use relay_transport::{Payload, RawFailure, SendReceipt, TransportError, TransportSession};

use crate::lifecycle::ConnectionMetadata;
use crate::pool::{CheckIn, PoolShared};

/// An exclusive lease on a pooled transport connection.
pub struct TransportClient {
    meta: ConnectionMetadata,
    session: Option<Box<dyn TransportSession>>,
    pool: Arc<PoolShared>,
    in_flight: bool,
}

impl TransportClient {
    pub(crate) fn new(
        meta: ConnectionMetadata,
        session: Box<dyn TransportSession>,
        pool: Arc<PoolShared>,
    ) -> Self {
        Self {
            meta,
            session: Some(session),
            pool,
            in_flight: false,
        }
    }

    /// Pool-unique connection identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.meta.id
    }

    /// Connection metadata as of the start of this lease.
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.meta
    }

    /// Messages successfully sent over this connection so far.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.meta.messages_sent
    }

    /// Check if the underlying session is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_connected())
    }

    /// Send a payload and end the lease.
    ///
    /// On success the message counter is incremented and the connection is
    /// released. On failure the engine code is classified; transport and
    /// authentication failures close the session and fault the connection,
    /// message-level rejections release it untouched.
    pub async fn send(mut self, payload: &Payload) -> Result<SendReceipt, TransportError> {
        self.in_flight = true;
        let result = match self.session.as_mut() {
            Some(session) => send_over(&mut **session, payload).await,
            None => Err(lease_ended()),
        };
        self.in_flight = false;

        match result {
            Ok(receipt) => {
                self.meta.messages_sent += 1;
                tracing::trace!(
                    connection_id = self.meta.id,
                    messages_sent = self.meta.messages_sent,
                    "message sent"
                );
                self.finish(CheckIn::Released);
                Ok(receipt)
            }
            Err(failure) => {
                tracing::error!(
                    connection_id = self.meta.id,
                    code = %failure.code,
                    detail = %failure.detail,
                    "send failed"
                );
                let error = TransportError::from_failure(failure);
                if error.kind().faults_connection() {
                    self.fault().await;
                } else {
                    self.finish(CheckIn::Released);
                }
                Err(error)
            }
        }
    }

    /// Verify connectivity and login with a lightweight round-trip, then
    /// end the lease.
    ///
    /// Returns `false` and faults the connection on any failure.
    pub async fn validate(mut self) -> bool {
        self.in_flight = true;
        let result = match self.session.as_mut() {
            Some(session) => session.validate().await,
            None => Err(lease_ended()),
        };
        self.in_flight = false;

        match result {
            Ok(()) => {
                self.finish(CheckIn::Released);
                true
            }
            Err(failure) => {
                tracing::error!(
                    connection_id = self.meta.id,
                    code = %failure.code,
                    detail = %failure.detail,
                    "connection validation failed"
                );
                self.fault().await;
                false
            }
        }
    }

    /// Return the connection to the pool.
    pub fn release(mut self) {
        self.finish(CheckIn::Released);
    }

    /// Close the session and retire the connection.
    pub async fn mark_faulted(mut self) {
        self.fault().await;
    }

    /// Close the underlying session. No-op if already closed.
    ///
    /// The lease stays active; a later send reconnects.
    pub async fn close(&mut self) {
        if let Some(session) = self.session.as_mut() {
            close_session(&mut **session).await;
        }
    }

    async fn fault(&mut self) {
        self.close().await;
        tracing::warn!(connection_id = self.meta.id, "connection faulted");
        self.finish(CheckIn::Faulted);
    }

    fn finish(&mut self, outcome: CheckIn) {
        if let Some(session) = self.session.take() {
            self.pool.check_in(&self.meta, session, outcome);
        }
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        if self.in_flight {
            tracing::warn!(
                connection_id = self.meta.id,
                "lease dropped during an engine call, faulting connection"
            );
            self.finish(CheckIn::Faulted);
        } else {
            self.finish(CheckIn::Released);
        }
    }
}

impl fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportClient")
            .field("id", &self.meta.id)
            .field("messages_sent", &self.meta.messages_sent)
            .field("connected", &self.is_connected())
            .finish()
    }
}

async fn send_over(
    session: &mut dyn TransportSession,
    payload: &Payload,
) -> Result<SendReceipt, RawFailure> {
    session.open_or_reuse().await?;
    session.send_payload(payload).await
}

fn lease_ended() -> RawFailure {
    RawFailure::new("Aborted", "lease already ended")
}

/// Close a session if it is still connected.
pub(crate) async fn close_session(session: &mut dyn TransportSession) {
    if session.is_connected() {
        session.close_session().await;
    }
}
