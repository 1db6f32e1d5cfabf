//! Connection pooling with metrics example.
//!
//! This example drives the pool against the in-memory engine from
//! `relay-testing` and shows how to monitor pool health through status and
//! metrics.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=relay_pool=debug cargo run -p relay-pool --example relay_pool
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use relay_pool::{ConnectionPool, PoolError, PoolSettings};
use relay_testing::{MockOutcome, MockTransport, fixtures};
use relay_transport::SessionConfig;
use tokio::time::Instant;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Relay Connection Pool Example ===\n");

    // One scripted transient failure, then every send succeeds.
    let transport = MockTransport::builder()
        .with_send_outcome(MockOutcome::Deliver)
        .with_send_outcome(MockOutcome::fail("ConnectionLost"))
        .with_send_delay(Duration::from_millis(20))
        .build();

    let session_config =
        SessionConfig::from_connection_string("Server=smtp.example.com:587;User Id=relay;Password=secret")?;

    let settings = PoolSettings::new()
        .max_pool_size(4)
        .max_connection_wait_time(Duration::from_secs(5))
        .max_connection_idle_time(Duration::from_secs(60))
        .cleanup_interval(Duration::from_secs(10));

    println!("Pool configuration:");
    println!("  Max pool size: {}", settings.max_pool_size);
    println!("  Wait budget: {:?}", settings.max_connection_wait_time);
    println!("  Idle timeout: {:?}", settings.max_connection_idle_time);
    println!();

    let pool = ConnectionPool::new(settings, session_config, transport.factory()).await?;

    // Example 1: Basic pool usage
    println!("1. Basic pool usage:");
    {
        let client = pool.lease().await?;
        let receipt = client.send(&fixtures::payload()).await?;
        println!("  Server replied: {}", receipt.response);
        // The send ended the lease; the connection is back in the pool.
    }

    // Example 2: A transport failure faults the connection
    println!("\n2. Transport failure:");
    let client = pool.lease().await?;
    match client.send(&fixtures::payload()).await {
        Ok(_) => println!("  Unexpected success"),
        Err(e) => println!("  Send failed ({}): {}", e.kind(), e),
    }
    print_pool_status(&pool);
    println!("  Cleanup removed {} connection(s)", pool.cleanup().await);

    // Example 3: Concurrent usage
    println!("\n3. Concurrent pool usage (10 parallel sends):");
    let start = Instant::now();
    let mut handles = vec![];

    for _ in 0..10 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let client = pool.lease().await?;
            let id = client.id();
            client
                .send(&fixtures::payload())
                .await
                .map_err(|e| PoolError::Configuration(e.to_string()))?;
            Ok::<_, PoolError>(id)
        }));
    }

    let mut completed = 0;
    for handle in handles {
        if handle.await?.is_ok() {
            completed += 1;
        }
    }

    println!("  Completed {} sends in {:?}", completed, start.elapsed());
    print_pool_status(&pool);

    // Example 4: Pool health
    println!("\n4. Pool health monitoring:");
    let status = pool.status();
    let utilization = status.utilization();
    let health_status = if utilization < 70.0 {
        "HEALTHY"
    } else if utilization < 90.0 {
        "WARNING"
    } else {
        "CRITICAL"
    };
    println!("  Pool health: {}", health_status);
    println!("  Utilization: {:.1}%", utilization);

    println!("\n5. Final pool metrics:");
    print_pool_metrics(&pool);

    println!("\n6. Graceful shutdown:");
    pool.close().await;
    println!("  Pool closed, {} session close(s)", transport.total_closes());

    Ok(())
}

fn print_pool_status(pool: &ConnectionPool) {
    let status = pool.status();
    println!(
        "  Status: {} in use, {} idle, {} retiring ({:.1}% utilization)",
        status.in_use,
        status.available,
        status.retiring,
        status.utilization()
    );
}

fn print_pool_metrics(pool: &ConnectionPool) {
    let metrics = pool.metrics();
    println!("  Metrics:");
    println!("    Connections created: {}", metrics.connections_created);
    println!("    Connections closed: {}", metrics.connections_closed);
    println!(
        "    Lease success rate: {:.2}%",
        metrics.lease_success_rate() * 100.0
    );
    println!(
        "    Faults: {}, retirements: {}",
        metrics.faults, metrics.retirements
    );
}
