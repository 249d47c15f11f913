//! Tiered product acquisition
//!
//! For one identifier, the service answers from the first tier that can:
//!
//! 1. the value store under `product:<ASIN>` (no freshness check, the TTL
//!    bounds staleness),
//! 2. the persistent store, if its record is younger than the freshness
//!    threshold,
//! 3. the provider, through the admission-controlled [`FetchClient`].
//!
//! Cache and persistent-store failures are logged and skipped. Only a
//! provider failure reaches the caller.

use crate::services::normalize::normalize;
use chrono::Utc;
use pulse_core::{
    Asin, MetricSnapshot, Product, ProductHistory, PulseConfig, PulseResult, StorageError,
    Timestamp,
};
use pulse_provider::FetchClient;
use pulse_storage::{get_json, set_json, ProductStore, ValueStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionSettings {
    /// TTL applied to `product:<ASIN>` entries.
    pub cache_ttl_seconds: u64,
    /// Maximum age of a persisted record that may skip the provider.
    pub freshness_threshold: Duration,
    /// Snapshots read to rebuild history.
    pub history_limit: usize,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self::from_config(&PulseConfig::default())
    }
}

impl AcquisitionSettings {
    pub fn from_config(config: &PulseConfig) -> Self {
        Self {
            cache_ttl_seconds: config.cache.ttl_seconds,
            freshness_threshold: config.freshness_threshold,
            history_limit: config.history_limit,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Which tier answered, plus persistence failures absorbed along the way.
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
    pub cache_hits: AtomicU64,
    pub store_hits: AtomicU64,
    /// Persisted records found but too old to serve
    pub stale_records: AtomicU64,
    pub provider_fetches: AtomicU64,
    pub persist_failures: AtomicU64,
}

impl AcquisitionMetrics {
    pub fn snapshot(&self) -> AcquisitionMetricsSnapshot {
        AcquisitionMetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            store_hits: self.store_hits.load(Ordering::Relaxed),
            stale_records: self.stale_records.load(Ordering::Relaxed),
            provider_fetches: self.provider_fetches.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcquisitionMetricsSnapshot {
    pub cache_hits: u64,
    pub store_hits: u64,
    pub stale_records: u64,
    pub provider_fetches: u64,
    pub persist_failures: u64,
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct AcquisitionService {
    cache: Arc<dyn ValueStore>,
    products: Arc<dyn ProductStore>,
    fetch: Arc<FetchClient>,
    settings: AcquisitionSettings,
    metrics: AcquisitionMetrics,
}

impl std::fmt::Debug for AcquisitionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionService")
            .field("cache", &self.cache.backend_name())
            .field("fetch", &self.fetch)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AcquisitionService {
    pub fn new(
        cache: Arc<dyn ValueStore>,
        products: Arc<dyn ProductStore>,
        fetch: Arc<FetchClient>,
        settings: AcquisitionSettings,
    ) -> Self {
        Self {
            cache,
            products,
            fetch,
            settings,
            metrics: AcquisitionMetrics::default(),
        }
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &AcquisitionMetrics {
        &self.metrics
    }

    pub fn fetch_client(&self) -> &Arc<FetchClient> {
        &self.fetch
    }

    /// Resolve a product through the cache, persistent and provider tiers.
    #[tracing::instrument(skip_all, fields(asin = %asin))]
    pub async fn acquire_or_fetch(&self, asin: &Asin) -> PulseResult<Product> {
        let key = asin.cache_key();

        match get_json::<Product>(self.cache.as_ref(), &key).await {
            Ok(Some(product)) => {
                self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Served from cache");
                return Ok(product);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Cache read failed, skipping cache tier"),
        }

        match self
            .products
            .product_get(asin, self.settings.history_limit)
            .await
        {
            Ok(Some(stored)) if stored.is_fresh(Utc::now(), self.settings.freshness_threshold) => {
                self.metrics.store_hits.fetch_add(1, Ordering::Relaxed);
                let product = stored.into_response();
                self.cache_write(&key, &product).await;
                tracing::debug!("Served fresh record from persistent store");
                return Ok(product);
            }
            Ok(Some(stored)) => {
                self.metrics.stale_records.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    updated_at = %stored.product.updated_at,
                    "Persisted record is stale, fetching from provider"
                );
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(
                error = %e,
                "Persistent store unavailable, falling back to provider"
            ),
        }

        let (product, persisted) = self.fetch_and_persist(asin).await?;
        if let Err(e) = persisted {
            self.metrics.persist_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "Failed to persist product, continuing");
        }
        self.cache_write(&key, &product).await;
        Ok(product)
    }

    /// Price and rank series for a product, resolved like [`Self::acquire_or_fetch`].
    pub async fn get_history(&self, asin: &Asin) -> PulseResult<ProductHistory> {
        let product = self.acquire_or_fetch(asin).await?;
        Ok(ProductHistory {
            price_history: product.price_history,
            bsr_history: product.bsr_history,
        })
    }

    /// Force a provider fetch, skipping the cache and persistent tiers.
    ///
    /// Persistence errors are returned so scheduled runs can count them.
    /// The cache is only written once the record is persisted.
    #[tracing::instrument(skip_all, fields(asin = %asin))]
    pub async fn refresh(&self, asin: &Asin) -> PulseResult<Product> {
        let (product, persisted) = self.fetch_and_persist(asin).await?;
        if let Err(e) = persisted {
            self.metrics.persist_failures.fetch_add(1, Ordering::Relaxed);
            return Err(e.into());
        }
        self.cache_write(&asin.cache_key(), &product).await;
        Ok(product)
    }

    /// Provider fetch and normalization. The persistence outcome is returned
    /// separately so each caller decides whether it is fatal.
    async fn fetch_and_persist(
        &self,
        asin: &Asin,
    ) -> PulseResult<(Product, Result<(), StorageError>)> {
        self.metrics.provider_fetches.fetch_add(1, Ordering::Relaxed);
        let raw = self.fetch.fetch(asin).await?;

        let fetched_at = Utc::now();
        let product = normalize(asin, raw, fetched_at);
        let persisted = self.persist(&product, fetched_at).await;
        Ok((product, persisted))
    }

    async fn persist(&self, product: &Product, fetched_at: Timestamp) -> Result<(), StorageError> {
        self.products.product_upsert(product).await?;
        self.products
            .snapshot_append(&MetricSnapshot::capture(product, fetched_at))
            .await
    }

    async fn cache_write(&self, key: &str, product: &Product) {
        if let Err(e) = set_json(
            self.cache.as_ref(),
            key,
            product,
            self.settings.cache_ttl_seconds,
        )
        .await
        {
            tracing::warn!(key, error = %e, "Cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use pulse_core::{ProviderError, PulseError};
    use pulse_provider::{AdmissionLimiter, RetryPolicy};
    use pulse_storage::{InMemoryProductStore, MemoryStore};
    use pulse_test_utils::{sample_payload, sample_product, FlakyProductStore, ScriptedProvider};

    struct Harness {
        cache: Arc<MemoryStore>,
        store: Arc<FlakyProductStore>,
        provider: Arc<ScriptedProvider>,
        service: AcquisitionService,
    }

    fn harness(provider: ScriptedProvider) -> Harness {
        let cache = Arc::new(MemoryStore::new());
        let store = Arc::new(FlakyProductStore::new(InMemoryProductStore::new()));
        let provider = Arc::new(provider);
        let fetch = Arc::new(FetchClient::new(
            provider.clone(),
            Arc::new(AdmissionLimiter::new(std::time::Duration::from_secs(60), 100)),
            RetryPolicy::linear(3, std::time::Duration::from_millis(10)),
            std::time::Duration::from_secs(10),
        ));
        let service = AcquisitionService::new(
            cache.clone(),
            store.clone(),
            fetch,
            AcquisitionSettings::default(),
        );
        Harness {
            cache,
            store,
            provider,
            service,
        }
    }

    fn asin() -> Asin {
        Asin::parse("B07XJWD7Z3").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_fetches_persists_and_caches() {
        let h = harness(ScriptedProvider::always(sample_payload(&asin())));

        let first = h.service.acquire_or_fetch(&asin()).await.unwrap();
        let second = h.service.acquire_or_fetch(&asin()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.provider.calls(), 1);
        assert_eq!(h.store.inner().product_count(), 1);
        assert_eq!(h.store.inner().snapshot_count(&asin()), 1);
        assert!(h.cache.get("product:B07XJWD7Z3").await.unwrap().is_some());

        let metrics = h.service.metrics().snapshot();
        assert_eq!(metrics.provider_fetches, 1);
        assert_eq!(metrics.cache_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_record_skips_provider_and_rebuilds_history() {
        let h = harness(ScriptedProvider::always(sample_payload(&asin())));
        let now = Utc::now();
        let product = sample_product(&asin(), now - ChronoDuration::seconds(30));
        h.store.inner().product_upsert(&product).await.unwrap();
        for days_ago in [2, 1] {
            let mut snapshot =
                MetricSnapshot::capture(&product, now - ChronoDuration::days(days_ago));
            snapshot.price = 10.0 + days_ago as f64;
            h.store.inner().snapshot_append(&snapshot).await.unwrap();
        }

        let served = h.service.acquire_or_fetch(&asin()).await.unwrap();

        assert_eq!(h.provider.calls(), 0);
        assert_eq!(served.price_history.len(), 2);
        assert_eq!(served.price_history[0].price, 12.0);
        assert_eq!(served.price_history[1].price, 11.0);
        assert_eq!(served.bsr_history.len(), 2);
        assert!(h.cache.get("product:B07XJWD7Z3").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_record_triggers_provider_call() {
        let h = harness(ScriptedProvider::always(sample_payload(&asin())));
        let stale = sample_product(&asin(), Utc::now() - ChronoDuration::minutes(6));
        h.store.inner().product_upsert(&stale).await.unwrap();

        let served = h.service.acquire_or_fetch(&asin()).await.unwrap();

        assert_eq!(h.provider.calls(), 1);
        assert!(served.updated_at > stale.updated_at);
        assert_eq!(h.service.metrics().snapshot().stale_records, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_store_fails_open() {
        let h = harness(ScriptedProvider::always(sample_payload(&asin())));
        h.store.set_unreachable(true);

        let served = h.service.acquire_or_fetch(&asin()).await.unwrap();

        assert_eq!(served.asin, asin());
        assert_eq!(h.provider.calls(), 1);
        assert_eq!(h.service.metrics().snapshot().persist_failures, 1);
        assert!(h.cache.get("product:B07XJWD7Z3").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_not_found_is_not_found() {
        let h = harness(ScriptedProvider::failing(ProviderError::ProductNotFound {
            provider: "scripted".to_string(),
            asin: "B07XJWD7Z3".to_string(),
        }));

        let err = h.service.acquire_or_fetch(&asin()).await.unwrap_err();
        assert!(matches!(err, PulseError::NotFound { .. }));
        // Not-found is retried like any other provider failure.
        assert_eq!(h.provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_exhaustion_is_upstream() {
        let h = harness(ScriptedProvider::failing(ProviderError::Transport {
            provider: "scripted".to_string(),
            reason: "connection reset".to_string(),
        }));

        match h.service.acquire_or_fetch(&asin()).await.unwrap_err() {
            PulseError::Upstream { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(h.provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_projects_both_series() {
        let h = harness(ScriptedProvider::always(sample_payload(&asin())));
        let product = h.service.acquire_or_fetch(&asin()).await.unwrap();

        let history = h.service.get_history(&asin()).await.unwrap();

        assert_eq!(history.price_history, product.price_history);
        assert_eq!(history.bsr_history, product.bsr_history);
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_bypasses_cache_and_propagates_persist_errors() {
        let h = harness(ScriptedProvider::always(sample_payload(&asin())));
        h.service.acquire_or_fetch(&asin()).await.unwrap();

        h.service.refresh(&asin()).await.unwrap();
        assert_eq!(h.provider.calls(), 2);
        assert_eq!(h.store.inner().snapshot_count(&asin()), 2);

        h.store.set_unreachable(true);
        let err = h.service.refresh(&asin()).await.unwrap_err();
        assert!(matches!(err, PulseError::Storage(StorageError::Unreachable { .. })));
    }
}
