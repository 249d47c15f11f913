//! Product records, metric snapshots and history projections

use crate::{Asin, EntityId, Timestamp};
use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tag set applied when a product reports none.
pub const DEFAULT_SEASONALITY_TAG: &str = "Evergreen";

/// Storage fee applied when a product reports none.
pub const DEFAULT_STORAGE_FEE: f64 = 0.55;

/// Format a timestamp as a `YYYY-MM-DD` history date (UTC).
pub fn history_date(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// Price observation on a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: String,
    pub price: f64,
}

/// Sales-rank observation on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankPoint {
    pub date: String,
    pub rank: i64,
}

/// Normalized product record.
///
/// This is the response shape of the acquisition pipeline and the value
/// cached under `product:<ASIN>`. The persistent store owns the canonical
/// copy; the pipeline only reads and upserts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub asin: Asin,
    pub title: String,
    pub brand: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    pub image: String,
    pub price: f64,
    pub bsr: i64,
    pub est_sales: i64,
    pub sellers: i64,
    pub referral_fee: f64,
    pub fba_fee: f64,
    pub storage_fee: f64,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub dimensions: Option<String>,
    pub is_hazmat: bool,
    pub is_ip_risk: bool,
    pub is_oversized: bool,
    pub rating: f64,
    pub reviews: i64,
    pub trend: f64,
    pub description: String,
    pub seasonality_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<serde_json::Value>,
    #[serde(default)]
    pub price_history: Vec<PricePoint>,
    #[serde(default)]
    pub bsr_history: Vec<RankPoint>,
    pub updated_at: Timestamp,
}

impl Product {
    /// Freshness check: `now - updated_at < threshold`.
    pub fn is_fresh(&self, now: Timestamp, threshold: Duration) -> bool {
        let threshold = ChronoDuration::from_std(threshold).unwrap_or(ChronoDuration::MAX);
        now.signed_duration_since(self.updated_at) < threshold
    }
}

/// Append-only metric observation for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub id: EntityId,
    pub asin: Asin,
    pub price: f64,
    pub bsr: i64,
    pub timestamp: Timestamp,
}

impl MetricSnapshot {
    /// Capture the current price and rank of a product at `timestamp`.
    pub fn capture(product: &Product, timestamp: Timestamp) -> Self {
        Self {
            id: crate::new_entity_id(),
            asin: product.asin.clone(),
            price: product.price,
            bsr: product.bsr,
            timestamp,
        }
    }
}

/// Price and rank series for one product, oldest first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductHistory {
    pub price_history: Vec<PricePoint>,
    pub bsr_history: Vec<RankPoint>,
}

impl ProductHistory {
    /// Build both series from snapshots given most-recent-first.
    pub fn from_recent_snapshots(recent_first: &[MetricSnapshot]) -> Self {
        let chronological = recent_first.iter().rev();
        let (price_history, bsr_history) = chronological
            .map(|m| {
                let date = history_date(&m.timestamp);
                (
                    PricePoint {
                        date: date.clone(),
                        price: m.price,
                    },
                    RankPoint { date, rank: m.bsr },
                )
            })
            .unzip();
        Self {
            price_history,
            bsr_history,
        }
    }
}

/// A persisted product row joined with its most recent snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProduct {
    /// Persisted attributes. History fields are empty here.
    pub product: Product,
    /// Most recent snapshots, newest first, bounded by the read limit.
    pub snapshots: Vec<MetricSnapshot>,
}

impl StoredProduct {
    pub fn is_fresh(&self, now: Timestamp, threshold: Duration) -> bool {
        self.product.is_fresh(now, threshold)
    }

    /// Map the stored row to the response shape with reconstructed history.
    pub fn into_response(self) -> Product {
        let history = ProductHistory::from_recent_snapshots(&self.snapshots);
        let mut product = self.product;
        if product.seasonality_tags.is_empty() {
            product.seasonality_tags = vec![DEFAULT_SEASONALITY_TAG.to_string()];
        }
        product.price_history = history.price_history;
        product.bsr_history = history.bsr_history;
        product
    }
}

// =============================================================================
// TESTS
// =============================================================================
