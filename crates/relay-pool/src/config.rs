//! Pool configuration.

use std::time::Duration;

/// Configuration for the connection pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct PoolSettings {
    /// Maximum number of healthy (not retiring) connections.
    ///
    /// Faulted and retired connections awaiting cleanup do not count
    /// against this bound.
    pub max_pool_size: usize,

    /// Maximum number of selection attempts per lease.
    pub max_connection_retries: u32,

    /// Wall-clock budget for a single lease.
    pub max_connection_wait_time: Duration,

    /// Wait between selection attempts.
    pub delay_between_retries: Duration,

    /// Time an idle connection may sit unused before cleanup closes it.
    pub max_connection_idle_time: Duration,

    /// Interval of the background cleanup task (`None` disables it).
    pub cleanup_interval: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_pool_size: 10,
            max_connection_retries: 50,
            max_connection_wait_time: Duration::from_secs(10),
            delay_between_retries: Duration::from_millis(200),
            max_connection_idle_time: Duration::from_secs(300),
            cleanup_interval: None,
        }
    }
}

impl PoolSettings {
    /// Create new pool settings with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of healthy connections.
    #[must_use]
    pub fn max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Set the maximum number of selection attempts per lease.
    #[must_use]
    pub fn max_connection_retries(mut self, retries: u32) -> Self {
        self.max_connection_retries = retries;
        self
    }

    /// Set the lease wait budget.
    #[must_use]
    pub fn max_connection_wait_time(mut self, wait: Duration) -> Self {
        self.max_connection_wait_time = wait;
        self
    }

    /// Set the delay between selection attempts.
    #[must_use]
    pub fn delay_between_retries(mut self, delay: Duration) -> Self {
        self.delay_between_retries = delay;
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn max_connection_idle_time(mut self, idle: Duration) -> Self {
        self.max_connection_idle_time = idle;
        self
    }

    /// Run cleanup in the background at the given interval.
    #[must_use]
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), crate::error::PoolError> {
        if self.max_pool_size == 0 {
            return Err(crate::error::PoolError::Configuration(
                "max_pool_size must be greater than 0".into(),
            ));
        }
        if self.max_connection_retries == 0 {
            return Err(crate::error::PoolError::Configuration(
                "max_connection_retries must be greater than 0".into(),
            ));
        }
        if self.cleanup_interval == Some(Duration::ZERO) {
            return Err(crate::error::PoolError::Configuration(
                "cleanup_interval must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
