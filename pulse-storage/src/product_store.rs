//! Persistent product store contract and an in-memory implementation.
//!
//! The store distinguishes "not found" (`Ok(None)`) from "unreachable"
//! (`Err(StorageError::Unreachable)`); the acquisition pipeline relies on
//! that to decide between fetching and failing open.

use async_trait::async_trait;
use pulse_core::{Asin, MetricSnapshot, Product, StorageError, StoredProduct};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// Persistence of product records and their metric snapshots.
#[async_trait]
pub trait ProductStore: Send + Sync {
    // ========================================================================
    // PRODUCT OPERATIONS
    // ========================================================================

    /// Get a product with its `history_limit` most recent snapshots,
    /// newest first.
    async fn product_get(
        &self,
        asin: &Asin,
        history_limit: usize,
    ) -> Result<Option<StoredProduct>, StorageError>;

    /// Insert or update a product keyed by ASIN. History fields are ignored.
    async fn product_upsert(&self, product: &Product) -> Result<(), StorageError>;

    /// Up to `limit` tracked identifiers, least recently updated first.
    async fn identifiers_page(&self, limit: usize) -> Result<Vec<Asin>, StorageError>;

    // ========================================================================
    // SNAPSHOT OPERATIONS
    // ========================================================================

    /// Append a metric snapshot. Snapshots are never updated or deleted.
    async fn snapshot_append(&self, snapshot: &MetricSnapshot) -> Result<(), StorageError>;

    // ========================================================================
    // HEALTH
    // ========================================================================

    async fn ping(&self) -> Result<(), StorageError>;
}

// ============================================================================
// IN-MEMORY IMPLEMENTATION
// ============================================================================

const BACKEND: &str = "memory";

fn poisoned() -> StorageError {
    StorageError::query_failed(BACKEND, "storage lock poisoned")
}

/// Snapshots retained per product by [`InMemoryProductStore`].
pub const DEFAULT_SNAPSHOT_CAP: usize = 1_000;

/// Product store kept in process memory. Used for development and tests.
///
/// Each product keeps at most `snapshot_cap` snapshots; appending past the
/// cap drops that product's oldest one.
#[derive(Debug)]
pub struct InMemoryProductStore {
    products: RwLock<HashMap<Asin, Product>>,
    snapshots: RwLock<HashMap<Asin, VecDeque<MetricSnapshot>>>,
    snapshot_cap: usize,
}

impl Default for InMemoryProductStore {
    fn default() -> Self {
        Self::with_snapshot_cap(DEFAULT_SNAPSHOT_CAP)
    }
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot_cap(cap: usize) -> Self {
        Self {
            products: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
            snapshot_cap: cap.max(1),
        }
    }

    pub fn product_count(&self) -> usize {
        self.products.read().map(|p| p.len()).unwrap_or(0)
    }

    /// Number of snapshots recorded for `asin`.
    pub fn snapshot_count(&self, asin: &Asin) -> usize {
        self.snapshots
            .read()
            .map(|s| s.get(asin).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn product_get(
        &self,
        asin: &Asin,
        history_limit: usize,
    ) -> Result<Option<StoredProduct>, StorageError> {
        let product = {
            let products = self.products.read().map_err(|_| poisoned())?;
            match products.get(asin) {
                Some(p) => p.clone(),
                None => return Ok(None),
            }
        };

        let mut recent: Vec<MetricSnapshot> = {
            let snapshots = self.snapshots.read().map_err(|_| poisoned())?;
            snapshots
                .get(asin)
                .map(|series| series.iter().cloned().collect())
                .unwrap_or_default()
        };
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(history_limit);

        Ok(Some(StoredProduct {
            product,
            snapshots: recent,
        }))
    }

    async fn product_upsert(&self, product: &Product) -> Result<(), StorageError> {
        let mut row = product.clone();
        row.price_history.clear();
        row.bsr_history.clear();
        let mut products = self.products.write().map_err(|_| poisoned())?;
        products.insert(row.asin.clone(), row);
        Ok(())
    }

    async fn identifiers_page(&self, limit: usize) -> Result<Vec<Asin>, StorageError> {
        let products = self.products.read().map_err(|_| poisoned())?;
        let mut rows: Vec<&Product> = products.values().collect();
        rows.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.asin.cmp(&b.asin))
        });
        Ok(rows.into_iter().take(limit).map(|p| p.asin.clone()).collect())
    }

    async fn snapshot_append(&self, snapshot: &MetricSnapshot) -> Result<(), StorageError> {
        let known = self
            .products
            .read()
            .map_err(|_| poisoned())?
            .contains_key(&snapshot.asin);
        if !known {
            return Err(StorageError::query_failed(
                BACKEND,
                format!("snapshot references unknown product {}", snapshot.asin),
            ));
        }
        let mut snapshots = self.snapshots.write().map_err(|_| poisoned())?;
        let series = snapshots.entry(snapshot.asin.clone()).or_default();
        if series.len() >= self.snapshot_cap {
            series.pop_front();
        }
        series.push_back(snapshot.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
