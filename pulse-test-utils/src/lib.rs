//! AMZPulse Test Utilities
//!
//! Shared test infrastructure for the AMZPulse workspace:
//! - Scripted product provider with call counting and latency
//! - Stores that can be switched into failure modes
//! - Proptest generators for identifiers and provider payloads
//! - Fixtures for common records

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pulse_core::{
    Asin, MetricSnapshot, Product, ProviderError, ProviderPayload, StorageError, StoredProduct,
};
use pulse_provider::ProductProvider;
use pulse_storage::{InMemoryProductStore, ProductStore, ValueStore};

pub use fixtures::{sample_payload, sample_product};

// ============================================================================
// SCRIPTED PROVIDER
// ============================================================================

type Script = dyn Fn(&Asin) -> Result<ProviderPayload, ProviderError> + Send + Sync;

/// Product provider whose answers are decided by a closure.
///
/// Every call is counted, including failed ones.
pub struct ScriptedProvider {
    script: Arc<Script>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl std::fmt::Debug for ScriptedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedProvider")
            .field("latency", &self.latency)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl ScriptedProvider {
    pub fn by_asin<F>(script: F) -> Self
    where
        F: Fn(&Asin) -> Result<ProviderPayload, ProviderError> + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(script),
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer every identifier with `payload`.
    pub fn always(payload: ProviderPayload) -> Self {
        Self::by_asin(move |_| Ok(payload.clone()))
    }

    /// Fail every call with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self::by_asin(move |_| Err(error.clone()))
    }

    /// Sleep this long (on the tokio clock) before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_product(&self, asin: &Asin) -> Result<ProviderPayload, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        (self.script)(asin)
    }
}

// ============================================================================
// FLAKY STORES
// ============================================================================

/// [`InMemoryProductStore`] that can be switched to report itself unreachable.
#[derive(Debug, Default)]
pub struct FlakyProductStore {
    inner: InMemoryProductStore,
    unreachable: AtomicBool,
}

impl FlakyProductStore {
    pub fn new(inner: InMemoryProductStore) -> Self {
        Self {
            inner,
            unreachable: AtomicBool::new(false),
        }
    }

    /// The wrapped store, for seeding and inspection regardless of mode.
    pub fn inner(&self) -> &InMemoryProductStore {
        &self.inner
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(StorageError::unreachable("flaky", "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProductStore for FlakyProductStore {
    async fn product_get(
        &self,
        asin: &Asin,
        history_limit: usize,
    ) -> Result<Option<StoredProduct>, StorageError> {
        self.check()?;
        self.inner.product_get(asin, history_limit).await
    }

    async fn product_upsert(&self, product: &Product) -> Result<(), StorageError> {
        self.check()?;
        self.inner.product_upsert(product).await
    }

    async fn identifiers_page(&self, limit: usize) -> Result<Vec<Asin>, StorageError> {
        self.check()?;
        self.inner.identifiers_page(limit).await
    }

    async fn snapshot_append(&self, snapshot: &MetricSnapshot) -> Result<(), StorageError> {
        self.check()?;
        self.inner.snapshot_append(snapshot).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.check()
    }
}

/// Value store whose every operation fails as unreachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingValueStore;

impl FailingValueStore {
    fn error() -> StorageError {
        StorageError::unreachable("failing", "connection refused")
    }
}

#[async_trait]
impl ValueStore for FailingValueStore {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(Self::error())
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> Result<(), StorageError> {
        Err(Self::error())
    }

    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Err(Self::error())
    }

    async fn increment(&self, _key: &str, _window_seconds: u64) -> Result<u64, StorageError> {
        Err(Self::error())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Err(Self::error())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    /// Generate a canonical ASIN.
    pub fn arb_asin() -> impl Strategy<Value = Asin> {
        "[A-Z0-9]{10}".prop_map(|s| Asin::parse(&s).expect("generated ASIN is valid"))
    }

    /// Generate raw identifier text that may or may not be a valid ASIN:
    /// mixed case, surrounding whitespace, wrong lengths, punctuation.
    pub fn arb_raw_identifier() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Za-z0-9]{10}",
            " {0,2}[a-z0-9]{10} {0,2}",
            "[A-Z0-9]{0,9}",
            "[A-Z0-9]{11,14}",
            "[A-Z0-9-]{10}",
        ]
    }

    fn arb_number() -> impl Strategy<Value = Option<f64>> {
        prop::option::of(prop_oneof![
            4 => 0.0..100_000.0f64,
            1 => Just(f64::NAN),
            1 => Just(f64::INFINITY),
            1 => Just(-1.5f64),
        ])
    }

    fn arb_text() -> impl Strategy<Value = Option<String>> {
        prop::option::of(prop_oneof!["[a-zA-Z0-9 ]{1,40}", Just("   ".to_string())])
    }

    /// Generate a provider payload with any subset of fields present.
    pub fn arb_payload() -> impl Strategy<Value = ProviderPayload> {
        (
            (arb_text(), arb_text(), arb_text(), arb_text()),
            (arb_number(), arb_number(), arb_number(), arb_number()),
            (arb_number(), arb_number(), arb_number()),
            prop::option::of(prop::collection::vec("[A-Za-z0-9]{1,12}", 0..4)),
        )
            .prop_map(
                |(
                    (title, brand, category, image),
                    (price, bsr, est_sales, sellers),
                    (storage_fee, rating, reviews),
                    seasonality_tags,
                )| ProviderPayload {
                    title,
                    brand,
                    category,
                    image,
                    price,
                    bsr,
                    est_sales,
                    sellers,
                    storage_fee,
                    rating,
                    reviews,
                    seasonality_tags,
                    ..ProviderPayload::default()
                },
            )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use pulse_core::{history_date, PricePoint, RankPoint, Timestamp};

    /// A fully populated provider payload for `asin`.
    pub fn sample_payload(asin: &Asin) -> ProviderPayload {
        ProviderPayload {
            asin: Some(asin.to_string()),
            title: Some(format!("Sample product {}", asin)),
            brand: Some("Acme".to_string()),
            category: Some("Kitchen".to_string()),
            sub_category: Some("Utensils".to_string()),
            image: Some(format!("https://images.test/{}.jpg", asin)),
            price: Some(24.99),
            bsr: Some(1520.0),
            est_sales: Some(430.0),
            sellers: Some(4.0),
            referral_fee: Some(3.75),
            fba_fee: Some(5.4),
            storage_fee: Some(0.8),
            weight: Some("1.2 lb".to_string()),
            dimensions: Some("10 x 4 x 2 in".to_string()),
            is_hazmat: Some(false),
            is_ip_risk: Some(false),
            is_oversized: Some(false),
            rating: Some(4.4),
            reviews: Some(812.0),
            trend: Some(2.5),
            description: Some("A sample product used in tests.".to_string()),
            seasonality_tags: Some(vec!["Evergreen".to_string()]),
            analysis: Some(serde_json::json!({ "opportunity": "medium" })),
            price_history: None,
            bsr_history: None,
            ..ProviderPayload::default()
        }
    }

    /// A normalized product for `asin` last updated at `updated_at`, with
    /// three days of history ending that day.
    pub fn sample_product(asin: &Asin, updated_at: Timestamp) -> Product {
        let days: Vec<Timestamp> = (0..3)
            .rev()
            .map(|d| updated_at - ChronoDuration::days(d))
            .collect();

        Product {
            asin: asin.clone(),
            title: format!("Sample product {}", asin),
            brand: "Acme".to_string(),
            category: "Kitchen".to_string(),
            sub_category: Some("Utensils".to_string()),
            image: format!("https://images.test/{}.jpg", asin),
            price: 24.99,
            bsr: 1520,
            est_sales: 430,
            sellers: 4,
            referral_fee: 3.75,
            fba_fee: 5.4,
            storage_fee: 0.8,
            weight: Some("1.2 lb".to_string()),
            dimensions: Some("10 x 4 x 2 in".to_string()),
            is_hazmat: false,
            is_ip_risk: false,
            is_oversized: false,
            rating: 4.4,
            reviews: 812,
            trend: 2.5,
            description: "A sample product used in tests.".to_string(),
            seasonality_tags: vec!["Evergreen".to_string()],
            analysis: None,
            price_history: days
                .iter()
                .map(|d| PricePoint {
                    date: history_date(d),
                    price: 24.99,
                })
                .collect(),
            bsr_history: days
                .iter()
                .map(|d| RankPoint {
                    date: history_date(d),
                    rank: 1520,
                })
                .collect(),
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn asin() -> Asin {
        Asin::parse("B07XJWD7Z3").unwrap()
    }

    #[tokio::test]
    async fn test_scripted_provider_counts_calls() {
        let provider = ScriptedProvider::failing(ProviderError::NotConfigured);
        assert!(provider.fetch_product(&asin()).await.is_err());
        assert!(provider.fetch_product(&asin()).await.is_err());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_flaky_store_toggles() {
        let store = FlakyProductStore::new(InMemoryProductStore::new());
        assert!(store.ping().await.is_ok());

        store.set_unreachable(true);
        assert!(matches!(
            store.product_get(&asin(), 5).await,
            Err(StorageError::Unreachable { .. })
        ));

        store.set_unreachable(false);
        assert_eq!(store.product_get(&asin(), 5).await, Ok(None));
    }

    proptest! {
        #[test]
        fn prop_generated_asins_round_trip(asin in generators::arb_asin()) {
            prop_assert_eq!(Asin::parse(asin.as_str()), Ok(asin));
        }
    }
}
