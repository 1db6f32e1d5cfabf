//! Test fixture utilities.

use std::time::Duration;

use relay_transport::{Credentials, Payload, SessionConfig};

/// Host name used by test session configs.
pub const TEST_HOST: &str = "smtp.test.local";

/// Session config pointing at [`TEST_HOST`] with test credentials.
#[must_use]
pub fn session_config() -> SessionConfig {
    SessionConfig::new(TEST_HOST).credentials(Credentials::new("relay", "secret"))
}

/// A small payload addressed to `recipients`.
#[must_use]
pub fn payload_to(recipients: &[&str]) -> Payload {
    Payload::new(
        "bounces@test.local",
        recipients.iter().map(|r| (*r).to_string()).collect(),
        "Subject: test\r\n\r\nhello\r\n",
    )
}

/// A small payload addressed to one recipient.
#[must_use]
pub fn payload() -> Payload {
    payload_to(&["rcpt@test.local"])
}

/// Timing used by tests that drive the pool under paused time.
#[derive(Debug, Clone, Copy)]
pub struct TestTiming {
    /// Lease wait budget.
    pub wait: Duration,
    /// Delay between lease polls.
    pub poll: Duration,
    /// Maximum lease polls.
    pub retries: u32,
}

impl Default for TestTiming {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(5),
            poll: Duration::from_millis(10),
            retries: 1_000,
        }
    }
}
