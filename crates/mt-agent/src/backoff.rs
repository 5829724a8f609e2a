//! Fixed backoff between reconnection attempts

use std::time::Duration;

use mt_core::config::RetryConfig;

/// Fixed-delay retry policy for reconnection attempts.
///
/// The agent retries indefinitely; only cancellation stops it.
pub struct FixedBackoff {
    /// Delay between attempts
    interval: Duration,
}

impl FixedBackoff {
    /// Create a new backoff from configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            interval: config.interval,
        }
    }

    /// Create a new backoff with a custom delay
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Get the delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_fixed() {
        let mut backoff = FixedBackoff::new(Duration::from_secs(5));

        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_from_config() {
        let mut backoff = FixedBackoff::from_config(&RetryConfig::default());
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }
}
