//! AMZPulse Core - Data Types
//!
//! Identifiers, product records, metric snapshots, provider payloads,
//! configuration and the error taxonomy. All other crates depend on this.
//! No I/O lives here; behaviour is limited to validation and derivation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod config;
pub mod entities;
pub mod error;
pub mod health;
pub mod identity;
pub mod payload;

pub use config::{
    parse_bool, CacheConfig, ProviderConfig, PulseConfig, RequestRateConfig, SyncConfig,
};
pub use entities::{
    history_date, MetricSnapshot, PricePoint, Product, ProductHistory, RankPoint, StoredProduct,
    DEFAULT_SEASONALITY_TAG, DEFAULT_STORAGE_FEE,
};
pub use error::{
    ConfigError, ProviderError, PulseError, PulseResult, StorageError, ValidationError,
};
pub use health::{ComponentHealth, HealthStatus, StoreHealth};
pub use identity::{Asin, ASIN_LEN};
pub use payload::ProviderPayload;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}
