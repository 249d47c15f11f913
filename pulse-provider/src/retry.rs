//! Bounded retry policy for provider calls.

use pulse_core::ProviderConfig;
use std::time::Duration;

/// Delay schedule between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffStrategy {
    /// Retry immediately
    #[default]
    None,
    /// `base * attempt` after the given 1-based attempt
    Linear { base: Duration },
}

impl BackoffStrategy {
    /// Delay to sleep after the failed 1-based `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::None => Duration::ZERO,
            BackoffStrategy::Linear { base } => base.saturating_mul(attempt),
        }
    }
}

/// Policy for retrying a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Never less than 1.
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_millis(200))
    }
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: BackoffStrategy::Linear { base },
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffStrategy::None,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::linear(config.retry_attempts, config.retry_base)
    }

    /// Delay after failed `attempt`, or `None` if it was the last one.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            Some(self.backoff.delay_after(attempt))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff_grows_with_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn test_zero_attempts_means_one() {
        let policy = RetryPolicy::linear(0, Duration::from_millis(50));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_after(1), None);
    }

    #[test]
    fn test_from_config_uses_provider_settings() {
        let config = ProviderConfig {
            retry_attempts: 5,
            retry_base: Duration::from_millis(10),
            ..ProviderConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after(4), Some(Duration::from_millis(40)));
    }
}
