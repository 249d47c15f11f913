//! Admission-controlled fetch client.
//!
//! Wraps a [`ProductProvider`] with the shared [`AdmissionLimiter`], a
//! per-attempt timeout and a bounded [`RetryPolicy`]. Every attempt,
//! retries included, consumes one admission slot.

use crate::limiter::AdmissionLimiter;
use crate::retry::RetryPolicy;
use crate::{select_provider, ProductProvider};
use pulse_core::{Asin, ProviderConfig, ProviderError, ProviderPayload, PulseError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// All attempts for one identifier failed.
#[derive(Debug, Clone, Error)]
#[error("Fetch of {asin} failed after {attempts} attempt(s): {last}")]
pub struct FetchError {
    pub asin: Asin,
    pub attempts: u32,
    /// Error from the final attempt.
    #[source]
    pub last: ProviderError,
}

impl From<FetchError> for PulseError {
    fn from(err: FetchError) -> Self {
        if err.last.is_not_found() {
            PulseError::NotFound {
                asin: err.asin.into_inner(),
            }
        } else {
            PulseError::Upstream {
                asin: err.asin.into_inner(),
                attempts: err.attempts,
                source: err.last,
            }
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct FetchMetrics {
    /// Provider calls started, retries included
    pub attempts: AtomicU64,
    /// Fetches that returned a payload
    pub successes: AtomicU64,
    /// Fetches that exhausted every attempt
    pub failures: AtomicU64,
    /// Attempts that had to wait for an admission slot
    pub throttled_waits: AtomicU64,
}

impl FetchMetrics {
    pub fn snapshot(&self) -> FetchMetricsSnapshot {
        FetchMetricsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            throttled_waits: self.throttled_waits.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchMetricsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub throttled_waits: u64,
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct FetchClient {
    provider: Arc<dyn ProductProvider>,
    limiter: Arc<AdmissionLimiter>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    metrics: FetchMetrics,
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("provider", &self.provider.name())
            .field("retry", &self.retry)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish_non_exhaustive()
    }
}

impl FetchClient {
    pub fn new(
        provider: Arc<dyn ProductProvider>,
        limiter: Arc<AdmissionLimiter>,
        retry: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            limiter,
            retry,
            attempt_timeout,
            metrics: FetchMetrics::default(),
        }
    }

    /// Build the client, provider and limiter from configuration.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let provider = select_provider(config)?;
        let limiter = Arc::new(AdmissionLimiter::new(
            config.window,
            config.rate_limit_per_window,
        ));
        Ok(Self::new(
            provider,
            limiter,
            RetryPolicy::from_config(config),
            config.timeout,
        ))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn limiter(&self) -> &Arc<AdmissionLimiter> {
        &self.limiter
    }

    pub fn metrics(&self) -> &FetchMetrics {
        &self.metrics
    }

    /// Fetch the raw payload for `asin`, retrying per policy.
    pub async fn fetch(&self, asin: &Asin) -> Result<ProviderPayload, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let waited = self.limiter.consume_slot().await;
            if !waited.is_zero() {
                self.metrics.throttled_waits.fetch_add(1, Ordering::Relaxed);
            }
            self.metrics.attempts.fetch_add(1, Ordering::Relaxed);

            let error = match tokio::time::timeout(
                self.attempt_timeout,
                self.provider.fetch_product(asin),
            )
            .await
            {
                Ok(Ok(payload)) => {
                    self.metrics.successes.fetch_add(1, Ordering::Relaxed);
                    return Ok(payload);
                }
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout {
                    provider: self.provider.name().to_string(),
                    timeout_ms: self.attempt_timeout.as_millis() as u64,
                },
            };

            tracing::warn!(
                asin = %asin,
                attempt,
                max_attempts,
                provider = self.provider.name(),
                error = %error,
                "Provider fetch attempt failed"
            );

            match self.retry.delay_after(attempt) {
                Some(delay) if attempt < max_attempts => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                _ => {
                    self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                    return Err(FetchError {
                        asin: asin.clone(),
                        attempts: attempt,
                        last: error,
                    });
                }
            }
        }
    }
}
