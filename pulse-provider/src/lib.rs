//! AMZPulse Provider - Admission-Controlled Fetch Client
//!
//! The [`ProductProvider`] trait abstracts the external product-data source.
//! [`FetchClient`] wraps a provider with sliding-window admission control,
//! per-attempt timeouts and bounded linear retry.

use async_trait::async_trait;
use pulse_core::{Asin, ProviderConfig, ProviderError, ProviderPayload};
use std::sync::Arc;

pub mod client;
pub mod limiter;
pub mod providers;
pub mod retry;

pub use client::{FetchClient, FetchError, FetchMetrics, FetchMetricsSnapshot};
pub use limiter::{AdmissionLimiter, SlidingWindow};
pub use providers::{HttpProductProvider, MockProductProvider};
pub use retry::{BackoffStrategy, RetryPolicy};

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// Source of raw product data.
///
/// Implementations must be thread-safe. A positive "unknown identifier"
/// answer is reported as [`ProviderError::ProductNotFound`].
#[async_trait]
pub trait ProductProvider: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &'static str;

    async fn fetch_product(&self, asin: &Asin) -> Result<ProviderPayload, ProviderError>;
}

/// HTTP provider when a base URL is configured, the mock otherwise.
pub fn select_provider(config: &ProviderConfig) -> Result<Arc<dyn ProductProvider>, ProviderError> {
    match config.base_url.as_deref() {
        Some(base_url) => {
            tracing::info!(base_url, "Using HTTP product provider");
            Ok(Arc::new(HttpProductProvider::new(
                base_url,
                config.api_key.clone(),
            )?))
        }
        None => {
            tracing::info!("No provider base URL configured, using mock product provider");
            Ok(Arc::new(MockProductProvider::new(config.mock_latency)))
        }
    }
}
