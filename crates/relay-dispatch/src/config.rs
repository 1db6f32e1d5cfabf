//! Dispatch configuration.

use std::time::Duration;

use crate::error::DispatchError;

/// Default number of send attempts per message.
pub const DEFAULT_MAX_TRIES: u32 = 3;

/// Default delay between send attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// Configuration for the dispatch coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct DispatchConfig {
    /// Maximum send attempts per message, including the first.
    pub max_tries: u32,

    /// Fixed delay between attempts.
    pub delay: Duration,

    /// Return path stamped on every outbound message.
    pub return_path: String,
}

impl DispatchConfig {
    /// Create a configuration with default retry settings.
    #[must_use]
    pub fn new(return_path: impl Into<String>) -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            delay: DEFAULT_DELAY,
            return_path: return_path.into(),
        }
    }

    /// Parse textual settings as stored by a host configuration store.
    ///
    /// `delay_ms` is in milliseconds.
    pub fn from_strings(
        max_tries: &str,
        delay_ms: &str,
        return_path: &str,
    ) -> Result<Self, DispatchError> {
        let max_tries: u32 = max_tries.trim().parse().map_err(|_| {
            DispatchError::Configuration(format!("invalid max tries: {max_tries}"))
        })?;
        let delay_ms: u64 = delay_ms
            .trim()
            .parse()
            .map_err(|_| DispatchError::Configuration(format!("invalid delay: {delay_ms}")))?;

        let config = Self::new(return_path.trim())
            .max_tries(max_tries)
            .delay(Duration::from_millis(delay_ms));
        config.validate()?;
        Ok(config)
    }

    /// Set the maximum number of attempts.
    #[must_use]
    pub fn max_tries(mut self, tries: u32) -> Self {
        self.max_tries = tries;
        self
    }

    /// Set the delay between attempts.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.max_tries == 0 {
            return Err(DispatchError::Configuration(
                "max_tries must be greater than 0".into(),
            ));
        }
        if self.return_path.trim().is_empty() {
            return Err(DispatchError::Configuration(
                "return_path must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::new("bounces@example.com");
        assert_eq!(config.max_tries, 3);
        assert_eq!(config.delay, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_strings() {
        let config = DispatchConfig::from_strings("5", " 250 ", "bounces@example.com").unwrap();
        assert_eq!(config.max_tries, 5);
        assert_eq!(config.delay, Duration::from_millis(250));
        assert_eq!(config.return_path, "bounces@example.com");
    }

    #[test]
    fn test_from_strings_rejects_garbage() {
        assert!(DispatchConfig::from_strings("three", "1000", "a@example.com").is_err());
        assert!(DispatchConfig::from_strings("3", "-1", "a@example.com").is_err());
        assert!(DispatchConfig::from_strings("0", "1000", "a@example.com").is_err());
        assert!(DispatchConfig::from_strings("3", "1000", "  ").is_err());
    }
}
