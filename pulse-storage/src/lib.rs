//! AMZPulse Storage - Cache Backends and Persistence Traits
//!
//! Defines the dual-backend value store used for caching and request-rate
//! counters, and the [`ProductStore`] abstraction over persisted products
//! and metric snapshots. The Postgres implementation lives in pulse-api.

pub mod cache;
pub mod product_store;

pub use cache::{
    get_json, set_json, DualStore, DualStoreMetrics, DualStoreSnapshot, MemoryStore, RedisStore,
    ValueStore, NO_EXPIRY,
};
pub use product_store::{InMemoryProductStore, ProductStore, DEFAULT_SNAPSHOT_CAP};
