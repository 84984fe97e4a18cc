//! Exponential backoff schedule

use crate::config::RetryConfig;
use std::time::Duration;

/// Upper bound on any single backoff delay
pub const MAX_DELAY: Duration = Duration::from_secs(300);

/// Retry policy: `max_retries` retries after the first attempt, the n-th
/// retry waiting `base_delay * backoff_factor^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff_factor,
        }
    }

    /// Delay before retry number `attempt` (1-based), capped at `MAX_DELAY`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        // An overflowing product is infinite and lands on the cap
        Duration::from_secs_f64(secs.max(0.0).min(MAX_DELAY.as_secs_f64()))
    }

    /// Every delay the policy can produce, in order
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_retries).map(|attempt| self.delay_for(attempt)).collect()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
            config.backoff_factor,
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubling_schedule() {
        let policy = RetryPolicy::new(4, Duration::from_millis(2000), 2.0);
        assert_eq!(
            policy.schedule(),
            vec![
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(8000),
                Duration::from_millis(16000),
            ]
        );
    }

    #[test]
    fn test_constant_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500), 1.0);
        assert!(policy.schedule().iter().all(|d| *d == Duration::from_millis(500)));
    }

    #[test]
    fn test_delay_capped_for_huge_attempts() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_millis(2000), 2.0);
        assert_eq!(policy.delay_for(20), MAX_DELAY);
        assert_eq!(policy.delay_for(u32::MAX), MAX_DELAY);
        assert_eq!(policy.delay_for(8), Duration::from_millis(256_000));
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
    }
}
