//! Connection pool integration tests.
//!
//! These tests drive the pool against the in-memory engine from
//! `relay-testing`. Timing-sensitive tests run on paused time, so sleeps
//! and wait budgets resolve deterministically:
//!
//! ```bash
//! cargo test -p relay-pool --test pool
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relay_pool::{
    ConnectionPool, ConnectionState, MAX_MESSAGES_PER_CONNECTION, PoolError, PoolSettings,
    TimeoutCause,
};
use relay_testing::fixtures::{self, TestTiming};
use relay_testing::{MockOutcome, MockTransport};
use relay_transport::ErrorKind;
use tokio::time::Instant;
use tokio_test::{assert_pending, assert_ready};
use tokio_util::sync::CancellationToken;

fn settings(max_pool_size: usize) -> PoolSettings {
    let timing = TestTiming::default();
    PoolSettings::new()
        .max_pool_size(max_pool_size)
        .max_connection_retries(timing.retries)
        .max_connection_wait_time(timing.wait)
        .delay_between_retries(timing.poll)
}

async fn pool_with(transport: &MockTransport, settings: PoolSettings) -> ConnectionPool {
    ConnectionPool::new(settings, fixtures::session_config(), transport.factory())
        .await
        .expect("Failed to create pool")
}

// =============================================================================
// Basic Pool Tests
// =============================================================================

#[tokio::test]
async fn test_pool_create_and_close() {
    let transport = MockTransport::new();
    let pool = pool_with(&transport, settings(5)).await;

    assert!(!pool.is_closed());
    let status = pool.status();
    assert_eq!(status.max, 5);
    assert_eq!(status.total, 0);

    pool.close().await;
    assert!(pool.is_closed());
}

#[tokio::test]
async fn test_pool_rejects_invalid_settings() {
    let transport = MockTransport::new();
    let result = ConnectionPool::new(
        PoolSettings::new().max_pool_size(0),
        fixtures::session_config(),
        transport.factory(),
    )
    .await;
    assert!(matches!(result, Err(PoolError::Configuration(_))));
}

#[tokio::test]
async fn test_pool_connection_reuse() {
    let transport = MockTransport::new();
    let pool = pool_with(&transport, settings(2)).await;

    let client = pool.lease().await.expect("Failed to lease");
    let first_id = client.id();
    client.send(&fixtures::payload()).await.expect("Send failed");

    let client = pool.lease().await.expect("Failed to lease");
    assert_eq!(client.id(), first_id, "Idle connection should be reused");
    assert_eq!(client.messages_sent(), 1);
    assert!(client.is_connected());
    client.send(&fixtures::payload()).await.expect("Send failed");

    assert_eq!(transport.sessions_created(), 1);
    assert_eq!(transport.sessions_opened(), 1);
    assert_eq!(transport.messages_delivered(), 2);

    let status = pool.status();
    assert_eq!(status.available, 1);
    assert_eq!(status.in_use, 0);
}

#[tokio::test]
async fn test_drop_releases_lease() {
    let transport = MockTransport::new();
    let pool = pool_with(&transport, settings(1)).await;

    {
        let _client = pool.lease().await.expect("Failed to lease");
        assert_eq!(pool.status().in_use, 1);
    }

    let status = pool.status();
    assert_eq!(status.in_use, 0);
    assert_eq!(status.available, 1);
}

// =============================================================================
// Bounds and Exclusivity
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_leases_respect_max_pool_size() {
    let transport = MockTransport::builder()
        .with_send_delay(Duration::from_millis(50))
        .build();
    let pool = pool_with(&transport, settings(3)).await;

    let in_use = Arc::new(Mutex::new(HashSet::new()));
    let mut handles = Vec::new();

    for _ in 0..20 {
        let pool = pool.clone();
        let in_use = in_use.clone();

        handles.push(tokio::spawn(async move {
            let client = pool.lease().await.expect("Failed to lease");
            let id = client.id();
            assert!(
                in_use.lock().unwrap().insert(id),
                "connection {id} leased twice"
            );
            assert!(pool.status().in_use <= 3);

            client.send(&fixtures::payload()).await.expect("Send failed");
            in_use.lock().unwrap().remove(&id);
        }));
    }

    for handle in handles {
        handle.await.expect("Task panicked");
    }

    assert_eq!(transport.messages_delivered(), 20);
    assert!(transport.sessions_created() <= 3);
    assert!(transport.max_concurrent_sends() <= 3);
    assert!(pool.status().total <= 3);
}

#[tokio::test(start_paused = true)]
async fn test_second_lease_waits_for_release() {
    let transport = MockTransport::new();
    let pool = pool_with(&transport, settings(1)).await;

    let held = pool.lease().await.expect("Failed to lease");
    let held_id = held.id();

    let mut waiting = tokio_test::task::spawn(pool.lease());
    assert_pending!(waiting.poll());

    tokio::time::advance(Duration::from_millis(100)).await;
    assert_pending!(waiting.poll());

    held.release();
    tokio::time::advance(TestTiming::default().poll).await;

    let client = assert_ready!(waiting.poll()).expect("Lease should succeed after release");
    assert_eq!(client.id(), held_id);
    assert_eq!(transport.sessions_created(), 1);
}

// =============================================================================
// Lease Timeouts
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_zero_wait_budget_fails_on_first_poll() {
    let transport = MockTransport::new();
    let pool = pool_with(
        &transport,
        settings(1).max_connection_wait_time(Duration::ZERO),
    )
    .await;

    let _held = pool.lease().await.expect("First lease should succeed");

    let err = pool.lease().await.unwrap_err();
    assert_eq!(err.timeout_cause(), Some(TimeoutCause::WaitExhausted));
    assert!(matches!(err, PoolError::WaitTimeout { waited } if waited == Duration::ZERO));
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_is_distinct_from_wait_timeout() {
    let transport = MockTransport::new();
    let pool = pool_with(
        &transport,
        settings(1)
            .max_connection_retries(3)
            .max_connection_wait_time(Duration::from_secs(60)),
    )
    .await;

    let _held = pool.lease().await.expect("First lease should succeed");

    let started = Instant::now();
    let err = pool.lease().await.unwrap_err();

    assert!(matches!(err, PoolError::RetriesExhausted { attempts: 3 }));
    assert_eq!(err.timeout_cause(), Some(TimeoutCause::RetriesExhausted));
    // No sleep after the final attempt.
    assert_eq!(started.elapsed(), TestTiming::default().poll * 2);
}

#[tokio::test(start_paused = true)]
async fn test_wait_budget_expires_before_retries() {
    let transport = MockTransport::new();
    let pool = pool_with(
        &transport,
        settings(1).max_connection_wait_time(Duration::from_millis(55)),
    )
    .await;

    let _held = pool.lease().await.expect("First lease should succeed");

    let err = pool.lease().await.unwrap_err();
    assert!(matches!(
        err,
        PoolError::WaitTimeout { waited } if waited == Duration::from_millis(55)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_lease_until_caller_deadline() {
    let transport = MockTransport::new();
    let pool = pool_with(&transport, settings(1)).await;

    let _held = pool.lease().await.expect("First lease should succeed");

    let deadline = Instant::now() + Duration::from_millis(30);
    let err = pool.lease_until(deadline).await.unwrap_err();
    assert!(matches!(
        err,
        PoolError::WaitTimeout { waited } if waited == Duration::from_millis(30)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_lease_with_cancel() {
    let transport = MockTransport::new();
    let pool = pool_with(&transport, settings(1)).await;

    let _held = pool.lease().await.expect("First lease should succeed");

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = pool.lease_with_cancel(&token).await.unwrap_err();
    assert!(matches!(err, PoolError::Cancelled));
    assert!(started.elapsed() < TestTiming::default().wait);
    assert!(!err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_creation_failure_backs_off_then_recovers() {
    let transport = MockTransport::builder().refuse_sessions(true).build();
    let pool = pool_with(&transport, settings(2).max_connection_retries(4)).await;

    let err = pool.lease().await.unwrap_err();
    assert!(matches!(err, PoolError::RetriesExhausted { attempts: 4 }));
    assert_eq!(pool.metrics().creation_failures, 4);
    assert_eq!(pool.status().total, 0);

    transport.set_refuse_sessions(false);
    let client = pool.lease().await.expect("Lease should succeed once the server accepts");
    client.send(&fixtures::payload()).await.expect("Send failed");
}

#[tokio::test]
async fn test_lease_after_close_fails() {
    let transport = MockTransport::new();
    let pool = pool_with(&transport, settings(2)).await;

    pool.close().await;
    let result = pool.lease().await;
    assert!(matches!(result, Err(PoolError::Closed)), "Should error when pool is closed");
}

// =============================================================================
// Failure Handling
// =============================================================================

#[tokio::test]
async fn test_message_rejection_keeps_connection() {
    let transport = MockTransport::builder()
        .with_send_outcome(MockOutcome::fail("NoValidRecipients"))
        .build();
    let pool = pool_with(&transport, settings(2)).await;

    let client = pool.lease().await.expect("Failed to lease");
    let id = client.id();
    let err = client.send(&fixtures::payload()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MessageRejected);

    let status = pool.status();
    assert_eq!(status.available, 1);
    assert_eq!(status.retiring, 0);
    assert_eq!(transport.close_calls(id), 0);

    let client = pool.lease().await.expect("Failed to lease");
    assert_eq!(client.id(), id);
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_transport_failure_faults_connection() {
    let transport = MockTransport::builder()
        .with_send_outcome(MockOutcome::fail("Timeout"))
        .build();
    let pool = pool_with(&transport, settings(2)).await;

    let client = pool.lease().await.expect("Failed to lease");
    let id = client.id();
    let err = client.send(&fixtures::payload()).await.unwrap_err();
    assert!(err.is_transient());

    let status = pool.status();
    assert_eq!(status.retiring, 1);
    assert_eq!(status.available, 0);
    assert_eq!(transport.close_calls(id), 1);
    assert_eq!(pool.metrics().faults, 1);

    let client = pool.lease().await.expect("Failed to lease");
    assert_ne!(client.id(), id, "Faulted connection must not be leased again");
    client.release();

    assert_eq!(pool.cleanup().await, 1);
    assert_eq!(transport.close_calls(id), 1, "Faulted session closed exactly once");
}

#[tokio::test]
async fn test_failed_validation_faults_connection() {
    let transport = MockTransport::builder()
        .with_validate_outcome(MockOutcome::fail("AuthFailure"))
        .build();
    let pool = pool_with(&transport, settings(2)).await;

    let client = pool.lease().await.expect("Failed to lease");
    assert!(!client.validate().await);
    assert_eq!(pool.status().retiring, 1);

    let client = pool.lease().await.expect("Failed to lease");
    assert!(client.validate().await);
    assert_eq!(pool.status().available, 1);
}

#[tokio::test]
async fn test_retirement_after_message_cap() {
    let transport = MockTransport::new();
    let pool = pool_with(&transport, settings(1)).await;
    let payload = fixtures::payload();

    for _ in 0..MAX_MESSAGES_PER_CONNECTION {
        let client = pool.lease().await.expect("Failed to lease");
        assert_eq!(client.id(), 1);
        client.send(&payload).await.expect("Send failed");
    }
    assert_eq!(pool.status().available, 1, "At the cap the connection stays idle");

    let client = pool.lease().await.expect("Failed to lease");
    client.send(&payload).await.expect("Send failed");

    let status = pool.status();
    assert_eq!(status.retiring, 1);
    assert_eq!(status.available, 0);
    assert_eq!(pool.metrics().retirements, 1);

    let client = pool.lease().await.expect("Failed to lease");
    assert_eq!(client.id(), 2, "Retired connection is replaced");
    assert_eq!(client.metadata().state, ConnectionState::Leased);
}

// =============================================================================
// Cleanup
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cleanup_removes_exactly_removable_connections() {
    let transport = MockTransport::builder()
        .with_send_outcomes([
            MockOutcome::Deliver,
            MockOutcome::fail("ConnectionLost"),
            MockOutcome::Deliver,
        ])
        .build();
    let pool = pool_with(
        &transport,
        settings(4).max_connection_idle_time(Duration::from_secs(60)),
    )
    .await;

    let idle = pool.lease().await.unwrap();
    let faulted = pool.lease().await.unwrap();
    let held = pool.lease().await.unwrap();
    let fresh = pool.lease().await.unwrap();
    let (idle_id, faulted_id, held_id, fresh_id) =
        (idle.id(), faulted.id(), held.id(), fresh.id());

    idle.send(&fixtures::payload()).await.unwrap();
    faulted.send(&fixtures::payload()).await.unwrap_err();

    tokio::time::advance(Duration::from_secs(61)).await;

    // Released just now; not yet idle long enough.
    fresh.send(&fixtures::payload()).await.unwrap();

    let removed = pool.cleanup().await;
    assert_eq!(removed, 2);

    let status = pool.status();
    assert_eq!(status.total, 2);
    assert_eq!(status.in_use, 1);
    assert_eq!(status.available, 1);

    assert_eq!(transport.close_calls(idle_id), 1);
    assert_eq!(transport.close_calls(faulted_id), 1);
    assert_eq!(transport.close_calls(held_id), 0, "Leased connections are never removed");
    assert_eq!(transport.close_calls(fresh_id), 0);

    // Even a long-leased connection survives cleanup.
    tokio::time::advance(Duration::from_secs(3600)).await;
    pool.cleanup().await;
    assert_eq!(pool.status().in_use, 1);
    drop(held);
    assert_eq!(pool.metrics().cleanup_runs, 2);
}

#[tokio::test(start_paused = true)]
async fn test_background_cleanup() {
    let transport = MockTransport::new();
    let pool = pool_with(
        &transport,
        settings(2)
            .max_connection_idle_time(Duration::from_secs(5))
            .cleanup_interval(Duration::from_secs(1)),
    )
    .await;

    let client = pool.lease().await.unwrap();
    let id = client.id();
    client.send(&fixtures::payload()).await.unwrap();
    assert_eq!(pool.status().available, 1);

    tokio::time::sleep(Duration::from_secs(7)).await;

    assert_eq!(pool.status().total, 0);
    assert_eq!(transport.close_calls(id), 1);
    assert!(pool.metrics().cleanup_runs >= 5);

    pool.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_close_closes_idle_and_returned_connections() {
    let transport = MockTransport::new();
    let pool = pool_with(&transport, settings(2)).await;

    let first = pool.lease().await.unwrap();
    let held = pool.lease().await.unwrap();
    let (first_id, held_id) = (first.id(), held.id());
    first.send(&fixtures::payload()).await.unwrap();

    // Open the held session so there is something to close.
    assert!(held.validate().await);
    let held = pool.lease().await.unwrap();
    let second = pool.lease().await.unwrap();
    assert_eq!(
        HashSet::from([held.id(), second.id()]),
        HashSet::from([first_id, held_id])
    );
    second.release();

    pool.close().await;
    assert_eq!(pool.status().total, 1, "Leased connection stays until returned");

    let returned_id = held.id();
    held.release();
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(pool.status().total, 0);
    assert_eq!(transport.close_calls(first_id), 1);
    assert_eq!(transport.close_calls(held_id), 1);
    assert_eq!(transport.close_calls(returned_id), 1);
    assert_eq!(pool.metrics().connections_closed, 2);
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_pool_metrics() {
    let transport = MockTransport::new();
    let pool = pool_with(
        &transport,
        settings(1).max_connection_wait_time(Duration::ZERO),
    )
    .await;

    let client = pool.lease().await.unwrap();
    assert!(pool.lease().await.is_err());
    client.release();

    let metrics = pool.metrics();
    assert_eq!(metrics.connections_created, 1);
    assert_eq!(metrics.leases_successful, 1);
    assert_eq!(metrics.leases_failed, 1);
    assert!((metrics.lease_success_rate() - 0.5).abs() < f64::EPSILON);
}

// =============================================================================
// Interrupted and Failed Sessions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancelled_send_faults_connection() {
    let transport = MockTransport::new();
    let pool = pool_with(&transport, settings(2)).await;

    let client = pool.lease().await.unwrap();
    let id = client.id();
    client.send(&fixtures::payload()).await.unwrap();

    transport.set_send_delay(Some(Duration::from_secs(10)));
    let client = pool.lease().await.unwrap();
    assert_eq!(client.id(), id);
    let payload = fixtures::payload();
    let timed_out = tokio::time::timeout(Duration::from_millis(100), client.send(&payload)).await;
    assert!(timed_out.is_err(), "Send should still be in progress");

    let status = pool.status();
    assert_eq!(status.available, 0, "Interrupted session must not be reused");
    assert_eq!(status.retiring, 1);
    assert_eq!(pool.metrics().faults, 1);

    transport.set_send_delay(None);
    let client = pool.lease().await.unwrap();
    assert_ne!(client.id(), id);
    client.send(&fixtures::payload()).await.unwrap();

    assert_eq!(pool.cleanup().await, 1);
    assert_eq!(transport.close_calls(id), 1);
}

#[tokio::test]
async fn test_connect_failure_faults_connection() {
    let transport = MockTransport::builder()
        .with_open_outcome(MockOutcome::fail("ConnectFailed"))
        .build();
    let pool = pool_with(&transport, settings(2)).await;

    let client = pool.lease().await.unwrap();
    let id = client.id();
    let err = client.send(&fixtures::payload()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fatal);
    assert!(err.is_transport_failure());
    assert_eq!(transport.send_attempts(), 0, "Nothing is sent before connecting");

    let status = pool.status();
    assert_eq!(status.retiring, 1);
    assert_eq!(status.available, 0);

    let client = pool.lease().await.unwrap();
    assert_ne!(client.id(), id);
    client.send(&fixtures::payload()).await.expect("Fresh session should connect");

    assert_eq!(transport.sessions_created(), 2);
    assert_eq!(transport.sessions_opened(), 1);
    assert_eq!(transport.close_calls(id), 0, "A session that never opened has nothing to close");
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_concurrent_with_leases() {
    let transport = MockTransport::builder()
        .with_send_delay(Duration::from_millis(5))
        .build();
    let pool = pool_with(
        &transport,
        settings(3).max_connection_idle_time(Duration::ZERO),
    )
    .await;

    let cleaner = {
        let pool = pool.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                pool.cleanup().await;
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    };

    let mut workers = Vec::new();
    for _ in 0..6 {
        let pool = pool.clone();
        let transport = transport.clone();
        workers.push(tokio::spawn(async move {
            for _ in 0..10 {
                let client = pool.lease().await.expect("Failed to lease");
                let id = client.id();
                let closes = transport.close_calls(id);

                tokio::time::sleep(Duration::from_millis(3)).await;
                assert_eq!(
                    transport.close_calls(id),
                    closes,
                    "Leased connection {id} was closed by cleanup"
                );

                client.send(&fixtures::payload()).await.expect("Send failed");
            }
        }));
    }

    for worker in workers {
        worker.await.expect("Worker panicked");
    }
    cleaner.await.expect("Cleanup task panicked");

    assert_eq!(transport.messages_delivered(), 60);

    tokio::time::advance(Duration::from_millis(1)).await;
    pool.cleanup().await;
    assert_eq!(pool.status().total, 0);

    let metrics = pool.metrics();
    assert_eq!(metrics.connections_closed, transport.sessions_created());
    assert_eq!(u64::from(transport.total_closes()), metrics.connections_closed);
}

#[test]
fn test_return_to_closed_pool_outside_runtime_defers_close() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let transport = MockTransport::new();

    let (pool, client) = runtime.block_on(async {
        let pool = pool_with(&transport, settings(2)).await;
        let client = pool.lease().await.unwrap();
        pool.close().await;
        (pool, client)
    });

    // Not inside the runtime here, so the close cannot be spawned.
    drop(client);
    let status = pool.status();
    assert_eq!(status.total, 1);
    assert_eq!(status.retiring, 1);
    assert_eq!(pool.metrics().connections_closed, 0);

    runtime.block_on(pool.close());
    assert_eq!(pool.status().total, 0);
    assert_eq!(pool.metrics().connections_closed, 1);
    assert!(matches!(runtime.block_on(pool.lease()), Err(PoolError::Closed)));
}
