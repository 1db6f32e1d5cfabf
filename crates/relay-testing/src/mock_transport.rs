//! In-memory transport engine for unit testing.
//!
//! [`MockTransport`] implements [`SessionFactory`] and hands out sessions
//! that share one scripted state. Each send, validation and connect pops
//! the next scripted [`MockOutcome`] for that operation; an empty script
//! means success.
//!
//! ## Example
//!
//! ```rust,ignore
//! use relay_testing::{MockOutcome, MockTransport};
//!
//! let transport = MockTransport::builder()
//!     .with_send_outcome(MockOutcome::fail("NoValidRecipients"))
//!     .build();
//!
//! let factory = transport.factory();
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use relay_transport::{
    Payload, RawFailure, SendReceipt, SessionConfig, SessionFactory, TransportError,
    TransportSession,
};

/// Scripted result of one engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// The operation succeeds.
    Deliver,
    /// The operation fails with the given engine failure code.
    Fail(String),
}

impl MockOutcome {
    /// Create a failure outcome.
    pub fn fail(code: impl Into<String>) -> Self {
        Self::Fail(code.into())
    }

    fn into_result(self) -> Result<(), RawFailure> {
        match self {
            Self::Deliver => Ok(()),
            Self::Fail(code) => Err(RawFailure::new(code, "scripted failure")),
        }
    }
}

#[derive(Default)]
struct MockState {
    send_script: Mutex<VecDeque<MockOutcome>>,
    validate_script: Mutex<VecDeque<MockOutcome>>,
    open_script: Mutex<VecDeque<MockOutcome>>,
    refuse_sessions: AtomicBool,
    send_delay: Mutex<Option<Duration>>,
    next_session_id: AtomicU64,
    sessions_created: AtomicU64,
    sessions_opened: AtomicU64,
    messages_delivered: AtomicU64,
    send_attempts: AtomicU64,
    close_calls: Mutex<HashMap<u64, u32>>,
    payloads: Mutex<Vec<Payload>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Builder for [`MockTransport`].
#[derive(Default)]
pub struct MockTransportBuilder {
    send_script: Vec<MockOutcome>,
    validate_script: Vec<MockOutcome>,
    open_script: Vec<MockOutcome>,
    refuse_sessions: bool,
    send_delay: Option<Duration>,
}

impl MockTransportBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next unscripted send.
    pub fn with_send_outcome(mut self, outcome: MockOutcome) -> Self {
        self.send_script.push(outcome);
        self
    }

    /// Queue several send outcomes in order.
    pub fn with_send_outcomes(mut self, outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        self.send_script.extend(outcomes);
        self
    }

    /// Queue the outcome of the next validation round-trip.
    pub fn with_validate_outcome(mut self, outcome: MockOutcome) -> Self {
        self.validate_script.push(outcome);
        self
    }

    /// Queue the outcome of the next connect.
    pub fn with_open_outcome(mut self, outcome: MockOutcome) -> Self {
        self.open_script.push(outcome);
        self
    }

    /// Refuse every session creation until re-enabled.
    pub fn refuse_sessions(mut self, refuse: bool) -> Self {
        self.refuse_sessions = refuse;
        self
    }

    /// Delay every send by `delay`.
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    /// Build the transport.
    pub fn build(self) -> MockTransport {
        let state = MockState {
            send_script: Mutex::new(self.send_script.into()),
            validate_script: Mutex::new(self.validate_script.into()),
            open_script: Mutex::new(self.open_script.into()),
            refuse_sessions: AtomicBool::new(self.refuse_sessions),
            send_delay: Mutex::new(self.send_delay),
            next_session_id: AtomicU64::new(1),
            ..MockState::default()
        };
        MockTransport {
            state: Arc::new(state),
        }
    }
}

/// In-memory transport engine.
///
/// Clones share the same script and counters, so a test keeps one handle
/// for assertions while the pool owns another.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    /// Create a new builder.
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::new()
    }

    /// Create a transport on which every operation succeeds.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Get this transport as a shared factory for the pool.
    pub fn factory(&self) -> Arc<dyn SessionFactory> {
        Arc::new(self.clone())
    }

    /// Start or stop refusing session creation.
    pub fn set_refuse_sessions(&self, refuse: bool) {
        self.state.refuse_sessions.store(refuse, Ordering::SeqCst);
    }

    /// Change the per-send delay.
    pub fn set_send_delay(&self, delay: Option<Duration>) {
        *self.state.send_delay.lock() = delay;
    }

    /// Number of sessions the factory created.
    pub fn sessions_created(&self) -> u64 {
        self.state.sessions_created.load(Ordering::SeqCst)
    }

    /// Number of successful connects.
    pub fn sessions_opened(&self) -> u64 {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of sends that delivered.
    pub fn messages_delivered(&self) -> u64 {
        self.state.messages_delivered.load(Ordering::SeqCst)
    }

    /// Number of sends attempted, delivered or not.
    pub fn send_attempts(&self) -> u64 {
        self.state.send_attempts.load(Ordering::SeqCst)
    }

    /// Number of times the session with `session_id` was closed.
    pub fn close_calls(&self, session_id: u64) -> u32 {
        self.state
            .close_calls
            .lock()
            .get(&session_id)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of closes across all sessions.
    pub fn total_closes(&self) -> u32 {
        self.state.close_calls.lock().values().sum()
    }

    /// Payloads delivered so far, in order.
    pub fn delivered_payloads(&self) -> Vec<Payload> {
        self.state.payloads.lock().clone()
    }

    /// Highest number of sends observed in flight at once.
    pub fn max_concurrent_sends(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("sessions_created", &self.sessions_created())
            .field("messages_delivered", &self.messages_delivered())
            .field("total_closes", &self.total_closes())
            .finish()
    }
}

impl SessionFactory for MockTransport {
    fn create_session(
        &self,
        config: &SessionConfig,
    ) -> Result<Box<dyn TransportSession>, TransportError> {
        if self.state.refuse_sessions.load(Ordering::SeqCst) {
            return Err(TransportError::from_failure(RawFailure::new(
                "ConnectFailed",
                format!("mock refused session to {}:{}", config.host, config.port),
            )));
        }

        let id = self.state.next_session_id.fetch_add(1, Ordering::SeqCst);
        self.state.sessions_created.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(session_id = id, "mock session created");

        Ok(Box::new(MockSession {
            id,
            connected: false,
            state: Arc::clone(&self.state),
        }))
    }
}

/// Session handed out by [`MockTransport`].
struct MockSession {
    id: u64,
    connected: bool,
    state: Arc<MockState>,
}

struct InFlight<'a>(&'a MockState);

impl<'a> InFlight<'a> {
    fn enter(state: &'a MockState) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl TransportSession for MockSession {
    async fn open_or_reuse(&mut self) -> Result<(), RawFailure> {
        if self.connected {
            return Ok(());
        }
        let outcome = self.state.open_script.lock().pop_front();
        outcome.unwrap_or(MockOutcome::Deliver).into_result()?;
        self.connected = true;
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_payload(&mut self, payload: &Payload) -> Result<SendReceipt, RawFailure> {
        if !self.connected {
            return Err(RawFailure::new("ConnectionLost", "session is not open"));
        }

        let _guard = InFlight::enter(&self.state);
        self.state.send_attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *self.state.send_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.state.send_script.lock().pop_front();
        outcome.unwrap_or(MockOutcome::Deliver).into_result()?;

        self.state.messages_delivered.fetch_add(1, Ordering::SeqCst);
        self.state.payloads.lock().push(payload.clone());
        Ok(SendReceipt {
            response: "250 2.0.0 OK queued".into(),
            accepted_recipients: payload.recipients.len(),
        })
    }

    async fn validate(&mut self) -> Result<(), RawFailure> {
        self.open_or_reuse().await?;
        let outcome = self.state.validate_script.lock().pop_front();
        outcome.unwrap_or(MockOutcome::Deliver).into_result()
    }

    async fn close_session(&mut self) {
        self.connected = false;
        *self.state.close_calls.lock().entry(self.id).or_insert(0) += 1;
        tracing::trace!(session_id = self.id, "mock session closed");
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
