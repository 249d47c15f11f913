//! Bounded-concurrency batch acquisition
//!
//! Identifiers are processed in fixed-size chunks: every identifier in a
//! chunk is acquired concurrently, and the next chunk starts only after the
//! whole chunk settles. A failed item becomes an error entry and never
//! affects its siblings.

use crate::constants::MAX_BATCH_ITEMS;
use crate::error::{ApiError, ErrorCode};
use crate::services::acquisition::AcquisitionService;
use futures_util::future::join_all;
use pulse_core::{Asin, Product, ValidationError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

// ============================================================================
// CHUNKING
// ============================================================================

/// Run `op` over `items` in chunks of `chunk_size`, preserving input order.
///
/// A `chunk_size` of 0 is treated as 1.
pub async fn run_chunked<T, R, F, Fut>(items: &[T], chunk_size: usize, op: F) -> Vec<R>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let mut results = Vec::with_capacity(items.len());
    for chunk in items.chunks(chunk_size.max(1)) {
        let settled = join_all(chunk.iter().cloned().map(&op)).await;
        results.extend(settled);
    }
    results
}

// ============================================================================
// RESULTS
// ============================================================================

/// Outcome for one identifier of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum BatchItemResult {
    #[serde(rename = "ok")]
    Success { asin: Asin, product: Box<Product> },
    #[serde(rename = "error")]
    Error {
        asin: Asin,
        code: ErrorCode,
        message: String,
    },
}

impl BatchItemResult {
    pub fn asin(&self) -> &Asin {
        match self {
            BatchItemResult::Success { asin, .. } | BatchItemResult::Error { asin, .. } => asin,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchItemResult::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn of(results: &[BatchItemResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
        }
    }
}

// ============================================================================
// INPUT SANITIZING
// ============================================================================

/// Bound and clean a raw identifier list.
///
/// The size limit applies to the raw list. Entries that are not valid ASINs
/// after trimming and upper-casing are dropped; an empty result is an error.
pub fn sanitize_batch(raw: &[String]) -> Result<Vec<Asin>, ValidationError> {
    if raw.len() > MAX_BATCH_ITEMS {
        return Err(ValidationError::BatchTooLarge {
            count: raw.len(),
            max: MAX_BATCH_ITEMS,
        });
    }
    let asins: Vec<Asin> = raw.iter().filter_map(|s| Asin::parse(s).ok()).collect();
    if asins.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }
    Ok(asins)
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    service: Arc<AcquisitionService>,
    concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(service: Arc<AcquisitionService>, concurrency: usize) -> Self {
        Self {
            service,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Acquire every identifier. One result per input, in input order.
    pub async fn process_all(&self, asins: &[Asin]) -> Vec<BatchItemResult> {
        let service = self.service.as_ref();
        let results = run_chunked(asins, self.concurrency, |asin| async move {
            match service.acquire_or_fetch(&asin).await {
                Ok(product) => BatchItemResult::Success {
                    asin,
                    product: Box::new(product),
                },
                Err(e) => {
                    tracing::warn!(asin = %asin, error = %e, "Batch item failed");
                    let api_error = ApiError::from(e);
                    BatchItemResult::Error {
                        asin,
                        code: api_error.code,
                        message: api_error.message,
                    }
                }
            }
        })
        .await;

        let summary = BatchSummary::of(&results);
        tracing::info!(
            items = results.len(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Batch processed"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::acquisition::AcquisitionSettings;
    use pulse_core::ProviderError;
    use pulse_provider::{AdmissionLimiter, FetchClient, RetryPolicy};
    use pulse_storage::{InMemoryProductStore, MemoryStore};
    use pulse_test_utils::{sample_payload, ScriptedProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn asins(n: usize) -> Vec<Asin> {
        (1..=n)
            .map(|i| Asin::parse(&format!("B{:09}", i)).unwrap())
            .collect()
    }

    fn orchestrator(provider: ScriptedProvider, concurrency: usize) -> BatchOrchestrator {
        let fetch = FetchClient::new(
            Arc::new(provider),
            Arc::new(AdmissionLimiter::new(Duration::from_secs(60), 1_000)),
            RetryPolicy::no_retry(),
            Duration::from_secs(10),
        );
        let service = AcquisitionService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(InMemoryProductStore::new()),
            Arc::new(fetch),
            AcquisitionSettings::default(),
        );
        BatchOrchestrator::new(Arc::new(service), concurrency)
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failure_does_not_affect_siblings() {
        let input = asins(7);
        let bad = input[3].clone();
        let provider = ScriptedProvider::by_asin(move |asin| {
            if *asin == bad {
                Err(ProviderError::RequestFailed {
                    provider: "scripted".to_string(),
                    status: 500,
                    message: "boom".to_string(),
                })
            } else {
                Ok(sample_payload(asin))
            }
        });

        let results = orchestrator(provider, 5).process_all(&input).await;

        assert_eq!(results.len(), 7);
        let order: Vec<&Asin> = results.iter().map(|r| r.asin()).collect();
        assert_eq!(order, input.iter().collect::<Vec<_>>());
        assert_eq!(BatchSummary::of(&results), BatchSummary { succeeded: 6, failed: 1 });
        match &results[3] {
            BatchItemResult::Error { code, .. } => {
                assert_eq!(*code, ErrorCode::UpstreamUnavailable)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_run_concurrently_and_in_sequence() {
        let provider = ScriptedProvider::always(sample_payload(&asins(1)[0]))
            .with_latency(Duration::from_millis(100));

        let start = Instant::now();
        let results = orchestrator(provider, 5).process_all(&asins(12)).await;

        assert_eq!(results.len(), 12);
        // Three chunks (5, 5, 2), each bounded by one provider latency.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_run_chunked_bounds_in_flight_work() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let items: Vec<u32> = (0..10).collect();

        let out = run_chunked(&items, 3, |i| {
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i * 2
            }
        })
        .await;

        assert_eq!(out, (0..10).map(|i| i * 2).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_sanitize_drops_invalid_and_canonicalizes() {
        let raw = vec![
            " b07xjwd7z3 ".to_string(),
            "nope".to_string(),
            "B000000001".to_string(),
        ];
        let asins = sanitize_batch(&raw).unwrap();
        assert_eq!(asins.len(), 2);
        assert_eq!(asins[0].as_str(), "B07XJWD7Z3");
    }

    #[test]
    fn test_sanitize_rejects_empty_and_oversized() {
        assert_eq!(
            sanitize_batch(&["bad".to_string()]),
            Err(ValidationError::EmptyBatch)
        );
        let raw = vec!["B000000001".to_string(); MAX_BATCH_ITEMS + 1];
        assert!(matches!(
            sanitize_batch(&raw),
            Err(ValidationError::BatchTooLarge { count: 101, max: 100 })
        ));
    }

    #[test]
    fn test_result_serializes_with_status() {
        let result = BatchItemResult::Error {
            asin: Asin::parse("B000000001").unwrap(),
            code: ErrorCode::ProductNotFound,
            message: "Product B000000001 not found".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["asin"], "B000000001");
        assert_eq!(json["code"], "PRODUCT_NOT_FOUND");
    }
}
