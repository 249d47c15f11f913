//! Dual-backend value store with fail-open fallback.
//!
//! The networked backend (Redis) is authoritative while it is `Ready`. The
//! first operation error marks it `Degraded`; from then on every call is
//! served by the in-process [`MemoryStore`] without touching the network
//! until the health probe sees the backend answer again.
//!
//! ```ignore
//! let store = Arc::new(DualStore::connect(&config.cache).await);
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let probe = store.spawn_health_probe(config.cache.probe_interval, shutdown_rx);
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

use super::memory::MemoryStore;
use super::redis_store::RedisStore;
use super::traits::ValueStore;
use async_trait::async_trait;
use pulse_core::{CacheConfig, StorageError, StoreHealth};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct DualStoreMetrics {
    /// Operations answered by the fallback while degraded or after an error
    pub fallback_ops: AtomicU64,
    /// Ready -> Degraded transitions
    pub degradations: AtomicU64,
    /// Degraded -> Ready transitions
    pub recoveries: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualStoreSnapshot {
    pub fallback_ops: u64,
    pub degradations: u64,
    pub recoveries: u64,
}

impl DualStoreMetrics {
    pub fn snapshot(&self) -> DualStoreSnapshot {
        DualStoreSnapshot {
            fallback_ops: self.fallback_ops.load(Ordering::Relaxed),
            degradations: self.degradations.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

pub struct DualStore {
    networked: Option<Arc<dyn ValueStore>>,
    fallback: MemoryStore,
    health: RwLock<StoreHealth>,
    metrics: DualStoreMetrics,
}

impl std::fmt::Debug for DualStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualStore")
            .field("networked", &self.networked.as_ref().map(|b| b.backend_name()))
            .field("health", &self.health())
            .finish_non_exhaustive()
    }
}

impl DualStore {
    /// Store with no networked backend. Permanently `Degraded`.
    pub fn memory_only() -> Self {
        Self {
            networked: None,
            fallback: MemoryStore::new(),
            health: RwLock::new(StoreHealth::Degraded),
            metrics: DualStoreMetrics::default(),
        }
    }

    /// Store over `networked` in the `Unknown` state. Call
    /// [`DualStore::check_health`] before relying on the backend.
    pub fn new(networked: Arc<dyn ValueStore>) -> Self {
        Self {
            networked: Some(networked),
            fallback: MemoryStore::new(),
            health: RwLock::new(StoreHealth::Unknown),
            metrics: DualStoreMetrics::default(),
        }
    }

    /// Wrap `networked` and probe it once.
    pub async fn with_backend(networked: Arc<dyn ValueStore>) -> Self {
        let store = Self::new(networked);
        store.check_health().await;
        store
    }

    /// Build the store from configuration. Never fails: a missing or
    /// malformed Redis URL yields a memory-only store.
    pub async fn connect(config: &CacheConfig) -> Self {
        let Some(url) = config.redis_url.as_deref() else {
            tracing::info!("No Redis URL configured, using in-memory cache only");
            return Self::memory_only();
        };
        match RedisStore::open(url, config.redis_timeout) {
            Ok(redis) => {
                let store = Self::with_backend(Arc::new(redis)).await;
                if store.health().is_ready() {
                    tracing::info!("Redis connected");
                }
                store
            }
            Err(e) => {
                tracing::warn!(
                    event = "storage_degraded",
                    error = %e,
                    "Invalid Redis URL, falling back to in-memory cache"
                );
                Self::memory_only()
            }
        }
    }

    pub fn health(&self) -> StoreHealth {
        self.health
            .read()
            .map(|h| *h)
            .unwrap_or(StoreHealth::Degraded)
    }

    pub fn has_networked_backend(&self) -> bool {
        self.networked.is_some()
    }

    pub fn metrics(&self) -> &DualStoreMetrics {
        &self.metrics
    }

    /// The in-process fallback, exposed for maintenance such as
    /// [`MemoryStore::purge_expired`].
    pub fn fallback(&self) -> &MemoryStore {
        &self.fallback
    }

    fn set_health(&self, next: StoreHealth) -> StoreHealth {
        match self.health.write() {
            Ok(mut guard) => std::mem::replace(&mut *guard, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        }
    }

    /// Networked backend if it is currently `Ready`.
    fn active(&self) -> Option<&Arc<dyn ValueStore>> {
        if self.health().is_ready() {
            self.networked.as_ref()
        } else {
            None
        }
    }

    fn mark_degraded(&self, op: &'static str, error: &StorageError) {
        let previous = self.set_health(StoreHealth::Degraded);
        if previous != StoreHealth::Degraded {
            self.metrics.degradations.fetch_add(1, Ordering::Relaxed);
        }
        tracing::warn!(
            event = "storage_degraded",
            op,
            error = %error,
            "Networked cache failed, serving from in-memory fallback"
        );
    }

    /// Probe the networked backend once and update the health state.
    pub async fn check_health(&self) -> StoreHealth {
        let Some(backend) = self.networked.as_ref() else {
            self.set_health(StoreHealth::Degraded);
            return StoreHealth::Degraded;
        };
        match backend.ping().await {
            Ok(()) => {
                let previous = self.set_health(StoreHealth::Ready);
                if previous == StoreHealth::Degraded {
                    self.metrics.recoveries.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(backend = backend.backend_name(), "Networked cache recovered");
                }
                StoreHealth::Ready
            }
            Err(e) => {
                let previous = self.set_health(StoreHealth::Degraded);
                if previous == StoreHealth::Ready {
                    self.metrics.degradations.fetch_add(1, Ordering::Relaxed);
                }
                if previous != StoreHealth::Degraded {
                    tracing::warn!(
                        event = "storage_degraded",
                        error = %e,
                        "Networked cache unreachable, falling back to in-memory cache"
                    );
                } else {
                    tracing::debug!(error = %e, "Networked cache still unreachable");
                }
                StoreHealth::Degraded
            }
        }
    }

    /// Spawn the background maintenance task.
    ///
    /// Every tick drops expired fallback entries and, when a networked
    /// backend exists, re-probes it. Runs until `shutdown` flips to `true`.
    pub fn spawn_health_probe(
        self: &Arc<Self>,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; connect already probed.
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("Cache health probe shutting down");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let purged = store.fallback.purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, "Purged expired fallback entries");
                        }
                        if store.has_networked_backend() {
                            store.check_health().await;
                        }
                    }
                }
            }
        })
    }

    fn note_fallback(&self) {
        self.metrics.fallback_ops.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl ValueStore for DualStore {
    fn backend_name(&self) -> &'static str {
        "dual"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Some(backend) = self.active() {
            match backend.get(key).await {
                Ok(value) => return Ok(value),
                Err(e) => self.mark_degraded("get", &e),
            }
        }
        self.note_fallback();
        self.fallback.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StorageError> {
        if let Some(backend) = self.active() {
            match backend.set(key, value, ttl_seconds).await {
                Ok(()) => return Ok(()),
                Err(e) => self.mark_degraded("set", &e),
            }
        }
        self.note_fallback();
        self.fallback.set(key, value, ttl_seconds).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if let Some(backend) = self.active() {
            match backend.delete(key).await {
                Ok(()) => return Ok(()),
                Err(e) => self.mark_degraded("delete", &e),
            }
        }
        self.note_fallback();
        self.fallback.delete(key).await
    }

    async fn increment(&self, key: &str, window_seconds: u64) -> Result<u64, StorageError> {
        if let Some(backend) = self.active() {
            match backend.increment(key, window_seconds).await {
                Ok(count) => return Ok(count),
                Err(e) => self.mark_degraded("increment", &e),
            }
        }
        self.note_fallback();
        self.fallback.increment(key, window_seconds).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        match self.active() {
            Some(backend) => backend.ping().await,
            None => self.fallback.ping().await,
        }
    }
}
