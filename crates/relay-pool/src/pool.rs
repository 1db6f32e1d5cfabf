//! Connection pool implementation.
//!
//! The pool keeps every connection it has created in one list guarded by a
//! single mutex. The mutex is held only for synchronous selection and
//! structural changes; it is never held across a network operation or a
//! sleep.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use relay_transport::{SessionConfig, SessionFactory, TransportSession};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::{TransportClient, close_session};
use crate::config::PoolSettings;
use crate::error::PoolError;
use crate::lifecycle::{ConnectionMetadata, ConnectionState};

/// A bounded pool of SMTP transport connections.
///
/// Cloning the pool is cheap; clones share the same connections.
///
/// # Example
///
/// ```rust,ignore
/// use relay_pool::{ConnectionPool, PoolSettings};
///
/// let pool = ConnectionPool::builder()
///     .settings(PoolSettings::new().max_pool_size(4))
///     .session_config(SessionConfig::from_connection_string("Server=smtp.example.com:587")?)
///     .factory(engine)
///     .build()
///     .await?;
///
/// let client = pool.lease().await?;
/// let receipt = client.send(&payload).await?;
/// ```
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

/// How a lease ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckIn {
    Released,
    Faulted,
}

struct Slot {
    meta: ConnectionMetadata,
    /// `None` while the connection is leased.
    session: Option<Box<dyn TransportSession>>,
}

pub(crate) struct PoolShared {
    settings: PoolSettings,
    session_config: SessionConfig,
    factory: Arc<dyn SessionFactory>,
    slots: Mutex<Vec<Slot>>,
    closed: AtomicBool,
    next_connection_id: AtomicU64,
    created_at: Instant,
    metrics: Mutex<PoolMetricsInner>,
    maintenance: CancellationToken,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    connections_created: u64,
    connections_closed: u64,
    creation_failures: u64,
    leases_successful: u64,
    leases_failed: u64,
    faults: u64,
    retirements: u64,
    cleanup_runs: u64,
}

impl ConnectionPool {
    /// Create a new pool builder.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Create a new pool.
    ///
    /// Starts the background cleanup task when
    /// [`PoolSettings::cleanup_interval`] is set.
    pub async fn new(
        settings: PoolSettings,
        session_config: SessionConfig,
        factory: Arc<dyn SessionFactory>,
    ) -> Result<Self, PoolError> {
        settings.validate()?;
        session_config
            .validate()
            .map_err(|e| PoolError::Configuration(e.to_string()))?;

        let cleanup_interval = settings.cleanup_interval;
        let shared = Arc::new(PoolShared {
            settings,
            session_config,
            factory,
            slots: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            next_connection_id: AtomicU64::new(1),
            created_at: Instant::now(),
            metrics: Mutex::new(PoolMetricsInner::default()),
            maintenance: CancellationToken::new(),
        });

        if let Some(interval) = cleanup_interval {
            spawn_maintenance(&shared, interval);
        }

        tracing::info!(
            host = %shared.session_config.host,
            port = shared.session_config.port,
            max_pool_size = shared.settings.max_pool_size,
            "connection pool created"
        );

        Ok(Self { shared })
    }

    /// Lease a connection.
    ///
    /// Polls for an available connection up to
    /// [`PoolSettings::max_connection_retries`] times, waiting
    /// [`PoolSettings::delay_between_retries`] between polls. Fails with
    /// [`PoolError::WaitTimeout`] once
    /// [`PoolSettings::max_connection_wait_time`] has elapsed, or with
    /// [`PoolError::RetriesExhausted`] when the polls run out first.
    pub async fn lease(&self) -> Result<TransportClient, PoolError> {
        self.lease_inner(None).await
    }

    /// Lease a connection, giving up at `deadline` at the latest.
    ///
    /// The effective deadline is the earlier of `deadline` and the pool's
    /// own wait budget.
    pub async fn lease_until(&self, deadline: Instant) -> Result<TransportClient, PoolError> {
        self.lease_inner(Some(deadline)).await
    }

    /// Lease a connection, aborting with [`PoolError::Cancelled`] as soon as
    /// `cancel` fires.
    pub async fn lease_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<TransportClient, PoolError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.shared.metrics.lock().leases_failed += 1;
                tracing::debug!("connection lease cancelled");
                Err(PoolError::Cancelled)
            }
            result = self.lease_inner(None) => result,
        }
    }

    async fn lease_inner(&self, deadline: Option<Instant>) -> Result<TransportClient, PoolError> {
        let settings = &self.shared.settings;
        let started = Instant::now();
        let budget = started.checked_add(settings.max_connection_wait_time);
        let deadline = match (budget, deadline) {
            (Some(budget), Some(deadline)) => Some(budget.min(deadline)),
            (budget, deadline) => budget.or(deadline),
        };

        tracing::trace!("acquiring connection from pool");

        for attempt in 1..=settings.max_connection_retries {
            let selected = self.shared.try_select();
            if self.is_closed() {
                self.shared.metrics.lock().leases_failed += 1;
                return Err(PoolError::Closed);
            }

            if let Some(client) = selected {
                self.shared.metrics.lock().leases_successful += 1;
                tracing::debug!(
                    connection_id = client.id(),
                    attempt,
                    wait_ms = started.elapsed().as_millis() as u64,
                    "connection leased"
                );
                return Ok(client);
            }

            let now = Instant::now();
            let remaining = match deadline {
                Some(deadline) if now >= deadline => {
                    let waited = now.saturating_duration_since(started);
                    self.shared.metrics.lock().leases_failed += 1;
                    tracing::warn!(
                        attempt,
                        waited_ms = waited.as_millis() as u64,
                        "unable to obtain a connection: wait time exhausted"
                    );
                    return Err(PoolError::WaitTimeout { waited });
                }
                Some(deadline) => deadline.saturating_duration_since(now),
                None => Duration::MAX,
            };

            if attempt < settings.max_connection_retries {
                tokio::time::sleep(settings.delay_between_retries.min(remaining)).await;
            }
        }

        self.shared.metrics.lock().leases_failed += 1;
        tracing::warn!(
            attempts = settings.max_connection_retries,
            "unable to obtain a connection: retries exhausted"
        );
        Err(PoolError::RetriesExhausted {
            attempts: settings.max_connection_retries,
        })
    }

    /// Remove faulted, retired and idle-expired connections.
    ///
    /// Removed sessions are closed after the pool's lock is released.
    /// Leased connections are never removed. Returns the number of
    /// connections removed.
    pub async fn cleanup(&self) -> usize {
        self.shared.cleanup().await
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let slots = self.shared.slots.lock();
        let mut status = PoolStatus {
            available: 0,
            in_use: 0,
            retiring: 0,
            total: slots.len(),
            max: self.shared.settings.max_pool_size,
        };
        for slot in slots.iter() {
            match slot.meta.state {
                ConnectionState::Idle => status.available += 1,
                ConnectionState::Leased => status.in_use += 1,
                ConnectionState::Faulted | ConnectionState::Retired => status.retiring += 1,
            }
        }
        status
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.shared.metrics.lock();
        PoolMetrics {
            connections_created: inner.connections_created,
            connections_closed: inner.connections_closed,
            creation_failures: inner.creation_failures,
            leases_successful: inner.leases_successful,
            leases_failed: inner.leases_failed,
            faults: inner.faults,
            retirements: inner.retirements,
            cleanup_runs: inner.cleanup_runs,
            uptime: self.shared.created_at.elapsed(),
        }
    }

    /// Close the pool.
    ///
    /// Stops background cleanup, rejects further leases and closes every
    /// connection not currently leased. Leased connections are closed as
    /// they are returned. Calling it again closes any connection returned
    /// since without a runtime to close it on.
    pub async fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            self.shared.maintenance.cancel();
        }

        let drained: Vec<Slot> = {
            let mut slots = self.shared.slots.lock();
            let (leased, drained) = slots
                .drain(..)
                .partition(|slot| slot.meta.state == ConnectionState::Leased);
            *slots = leased;
            drained
        };

        let closed = drained.len();
        for slot in drained {
            self.shared.dispose(slot).await;
        }

        tracing::info!(
            closed,
            still_leased = self.shared.slots.lock().len(),
            "connection pool closed"
        );
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Get the pool settings.
    #[must_use]
    pub fn settings(&self) -> &PoolSettings {
        &self.shared.settings
    }

    /// Get the session configuration handed to the engine.
    #[must_use]
    pub fn session_config(&self) -> &SessionConfig {
        &self.shared.session_config
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("host", &self.shared.session_config.host)
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl PoolShared {
    /// Select an available connection or create one, under the pool lock.
    ///
    /// Returns `None` when the pool is closed or saturated, or the engine
    /// fails to create a session; the caller backs off and polls again.
    fn try_select(self: &Arc<Self>) -> Option<TransportClient> {
        let mut slots = self.slots.lock();
        if self.closed.load(Ordering::Acquire) {
            return None;
        }

        if let Some(slot) = slots
            .iter_mut()
            .find(|slot| slot.meta.state.is_available() && slot.session.is_some())
        {
            if let Some(session) = slot.session.take() {
                slot.meta.mark_leased();
                return Some(TransportClient::new(
                    slot.meta.clone(),
                    session,
                    Arc::clone(self),
                ));
            }
        }

        let healthy = slots
            .iter()
            .filter(|slot| slot.meta.state.is_healthy())
            .count();
        if healthy >= self.settings.max_pool_size {
            return None;
        }

        let session = match self.factory.create_session(&self.session_config) {
            Ok(session) => session,
            Err(e) => {
                self.metrics.lock().creation_failures += 1;
                tracing::warn!(error = %e, "failed to create transport connection");
                return None;
            }
        };

        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let mut meta = ConnectionMetadata::new(id);
        meta.mark_leased();
        slots.push(Slot {
            meta: meta.clone(),
            session: None,
        });
        self.metrics.lock().connections_created += 1;

        tracing::debug!(
            connection_id = meta.id,
            pool_size = healthy + 1,
            "created transport connection"
        );

        Some(TransportClient::new(meta, session, Arc::clone(self)))
    }

    /// Take a leased connection back.
    pub(crate) fn check_in(
        &self,
        lease: &ConnectionMetadata,
        session: Box<dyn TransportSession>,
        outcome: CheckIn,
    ) {
        let mut slots = self.slots.lock();
        // close() sets the flag before it takes the lock to drain.
        let closed = self.closed.load(Ordering::Acquire);

        let Some(index) = slots.iter().position(|slot| slot.meta.id == lease.id) else {
            tracing::warn!(
                connection_id = lease.id,
                "returned connection is not tracked by the pool"
            );
            return;
        };

        let slot = &mut slots[index];
        slot.meta.messages_sent = lease.messages_sent;
        match outcome {
            CheckIn::Released => slot.meta.mark_released(),
            CheckIn::Faulted => slot.meta.mark_faulted(),
        }

        match slot.meta.state {
            ConnectionState::Faulted => self.metrics.lock().faults += 1,
            ConnectionState::Retired => {
                self.metrics.lock().retirements += 1;
                tracing::debug!(
                    connection_id = slot.meta.id,
                    messages_sent = slot.meta.messages_sent,
                    "connection retired after reaching message cap"
                );
            }
            ConnectionState::Idle | ConnectionState::Leased => {}
        }

        tracing::trace!(
            connection_id = slot.meta.id,
            state = %slot.meta.state,
            "returning connection to pool"
        );

        if !closed {
            slot.session = Some(session);
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // Left for the next close() or cleanup() to close.
            if slot.meta.state.is_healthy() {
                slot.meta.state = ConnectionState::Retired;
            }
            slot.session = Some(session);
            tracing::warn!(
                connection_id = slot.meta.id,
                "connection returned to a closed pool outside a runtime, deferring close"
            );
            return;
        };

        slots.swap_remove(index);
        drop(slots);
        self.metrics.lock().connections_closed += 1;

        let mut session = session;
        handle.spawn(async move {
            close_session(&mut *session).await;
        });
    }

    async fn cleanup(&self) -> usize {
        let removed: Vec<Slot> = {
            let mut slots = self.slots.lock();
            let now = Instant::now();
            let idle_timeout = self.settings.max_connection_idle_time;
            let (removed, kept) = slots
                .drain(..)
                .partition(|slot| slot.meta.is_removable(idle_timeout, now));
            *slots = kept;
            removed
        };

        self.metrics.lock().cleanup_runs += 1;

        let count = removed.len();
        for slot in removed {
            tracing::debug!(
                connection_id = slot.meta.id,
                state = %slot.meta.state,
                "removing connection"
            );
            self.dispose(slot).await;
        }

        if count > 0 {
            tracing::info!(removed = count, "pool cleanup complete");
        }
        count
    }

    async fn dispose(&self, slot: Slot) {
        if let Some(mut session) = slot.session {
            close_session(&mut *session).await;
        }
        self.metrics.lock().connections_closed += 1;
    }
}

fn spawn_maintenance(shared: &Arc<PoolShared>, interval: Duration) {
    let weak = Arc::downgrade(shared);
    let token = shared.maintenance.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(shared) = weak.upgrade() else {
                break;
            };
            shared.cleanup().await;
        }

        tracing::debug!("pool maintenance task stopped");
    });
}

/// Builder for [`ConnectionPool`].
#[derive(Default)]
pub struct PoolBuilder {
    settings: PoolSettings,
    session_config: Option<SessionConfig>,
    factory: Option<Arc<dyn SessionFactory>>,
}

impl PoolBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool settings.
    #[must_use]
    pub fn settings(mut self, settings: PoolSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the maximum number of healthy connections.
    #[must_use]
    pub fn max_pool_size(mut self, size: usize) -> Self {
        self.settings.max_pool_size = size;
        self
    }

    /// Set the lease wait budget.
    #[must_use]
    pub fn max_connection_wait_time(mut self, wait: Duration) -> Self {
        self.settings.max_connection_wait_time = wait;
        self
    }

    /// Run cleanup in the background at the given interval.
    #[must_use]
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.settings.cleanup_interval = Some(interval);
        self
    }

    /// Set the session configuration handed to the engine.
    #[must_use]
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = Some(config);
        self
    }

    /// Set the transport engine.
    #[must_use]
    pub fn factory(mut self, factory: Arc<dyn SessionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Build the pool.
    pub async fn build(self) -> Result<ConnectionPool, PoolError> {
        let session_config = self
            .session_config
            .ok_or_else(|| PoolError::Configuration("session config is required".into()))?;
        let factory = self
            .factory
            .ok_or_else(|| PoolError::Configuration("session factory is required".into()))?;
        ConnectionPool::new(self.settings, session_config, factory).await
    }
}

impl fmt::Debug for PoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("settings", &self.settings)
            .field("session_config", &self.session_config)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: usize,
    /// Number of connections currently leased.
    pub in_use: usize,
    /// Number of faulted or retired connections awaiting cleanup.
    pub retiring: usize,
    /// Total number of tracked connections.
    pub total: usize,
    /// Maximum allowed healthy connections.
    pub max: usize,
}

impl PoolStatus {
    /// Healthy connections as a percentage of the maximum.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        ((self.available + self.in_use) as f64 / self.max as f64) * 100.0
    }

    /// Check if no further connections can be created.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.available + self.in_use >= self.max
    }
}

/// Pool metrics snapshot.
#[derive(Debug, Clone, Copy)]
pub struct PoolMetrics {
    /// Connections created by the engine.
    pub connections_created: u64,
    /// Connections removed from the pool and closed.
    pub connections_closed: u64,
    /// Session creations the engine refused.
    pub creation_failures: u64,
    /// Leases granted.
    pub leases_successful: u64,
    /// Leases that ended in an error.
    pub leases_failed: u64,
    /// Connections checked in as faulted.
    pub faults: u64,
    /// Connections retired at the message cap.
    pub retirements: u64,
    /// Cleanup passes run.
    pub cleanup_runs: u64,
    /// Time since the pool was created.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Fraction of lease requests that succeeded.
    #[must_use]
    pub fn lease_success_rate(&self) -> f64 {
        let total = self.leases_successful + self.leases_failed;
        if total == 0 {
            return 1.0;
        }
        self.leases_successful as f64 / total as f64
    }
}
