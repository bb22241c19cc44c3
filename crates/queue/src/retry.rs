//! Retry configuration for the send lane.

use std::time::Duration;

use apalis::layers::retry::backoff::Backoff;
use apalis::layers::retry::{BackoffRetryPolicy, RetryPolicy};

/// Retry configuration with exponential backoff.
///
/// Applied to send batches only: a batch that fails on infrastructure (lost
/// database connection, Redis hiccup) is re-run, and the conflict-ignoring
/// log insert absorbs any rows the earlier attempt already wrote. Provider
/// rejections never reach this path; they are recorded as failed logs.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(600),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for the given attempt number (0-indexed).
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt >= self.max_retries {
            return self.max_delay;
        }

        let delay_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let delay = Duration::from_secs_f64(delay_secs);

        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }

    /// Check if we should retry after the given number of attempts.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Build the retry policy for a worker's middleware stack.
    ///
    /// Failed attempts wait out [`Self::delay_for_attempt`] before re-running.
    #[must_use]
    pub fn policy(&self) -> BackoffRetryPolicy<ConfiguredBackoff> {
        RetryPolicy::retries(self.max_retries as usize).with_backoff(ConfiguredBackoff {
            config: self.clone(),
            attempt: 0,
        })
    }
}

/// Backoff sequence driven by a [`RetryConfig`] schedule.
#[derive(Debug)]
pub struct ConfiguredBackoff {
    config: RetryConfig,
    attempt: u32,
}

/// A clone starts a fresh backoff session.
impl Clone for ConfiguredBackoff {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            attempt: 0,
        }
    }
}

impl Backoff for ConfiguredBackoff {
    type Future = tokio::time::Sleep;

    fn next_backoff(&mut self) -> Self::Future {
        let delay = self.config.delay_for_attempt(self.attempt);
        self.attempt += 1;
        tokio::time::sleep(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let config = RetryConfig::default();

        // First retry: 10s
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(10));
        // Second retry: 20s
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(20));
        // Third retry: 40s
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(40));
    }

    #[test]
    fn test_max_delay() {
        let config = RetryConfig {
            max_retries: 10,
            initial_delay: Duration::from_secs(300),
            max_delay: Duration::from_secs(600),
            multiplier: 2.0,
        };

        // Should be capped at max_delay
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(600));
    }

    #[test]
    fn test_should_retry() {
        let config = RetryConfig::default();

        assert!(config.should_retry(0));
        assert!(config.should_retry(1));
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));
        assert!(!config.should_retry(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_out_the_configured_schedule() {
        let mut backoff = ConfiguredBackoff {
            config: RetryConfig::default(),
            attempt: 0,
        };

        let started = tokio::time::Instant::now();
        backoff.next_backoff().await;
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        backoff.next_backoff().await;
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        backoff.next_backoff().await;
        assert_eq!(started.elapsed(), Duration::from_secs(70));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_clone_starts_a_fresh_session() {
        let mut backoff = ConfiguredBackoff {
            config: RetryConfig::default(),
            attempt: 0,
        };
        backoff.next_backoff().await;
        backoff.next_backoff().await;

        let mut fresh = backoff.clone();
        let started = tokio::time::Instant::now();
        fresh.next_backoff().await;
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }
}
