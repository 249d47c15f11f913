//! Value store contract shared by every cache backend.
//!
//! Values are opaque serialized payloads. Typed access goes through
//! [`get_json`] and [`set_json`], which treat undecodable payloads as absent.

use async_trait::async_trait;
use pulse_core::StorageError;
use serde::{de::DeserializeOwned, Serialize};

/// TTL value meaning "never expires".
pub const NO_EXPIRY: u64 = 0;

/// Key/value backend with TTL and fixed-window counters.
///
/// Implementations must be safe to share across tasks. Errors describe the
/// backend failure; whether to degrade or propagate is the caller's decision.
#[async_trait]
pub trait ValueStore: Send + Sync {
    /// Short backend name used in logs and errors.
    fn backend_name(&self) -> &'static str;

    /// Read a value. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value. `ttl_seconds == 0` stores it without expiry.
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Increment a counter and return the new count.
    ///
    /// The first increment of a key starts its window; the key expires
    /// `window_seconds` later, resetting the count.
    async fn increment(&self, key: &str, window_seconds: u64) -> Result<u64, StorageError>;

    /// Cheap reachability probe.
    async fn ping(&self) -> Result<(), StorageError>;
}

/// Read and decode a JSON value. Missing or undecodable payloads are `None`.
pub async fn get_json<T>(store: &dyn ValueStore, key: &str) -> Result<Option<T>, StorageError>
where
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::debug!(key, error = %e, "Discarding undecodable cache payload");
            Ok(None)
        }
    }
}

/// Encode a value as JSON and write it.
pub async fn set_json<T>(
    store: &dyn ValueStore,
    key: &str,
    value: &T,
    ttl_seconds: u64,
) -> Result<(), StorageError>
where
    T: Serialize + Sync,
{
    let raw = serde_json::to_string(value).map_err(|e| StorageError::Serialization {
        reason: e.to_string(),
    })?;
    store.set(key, &raw, ttl_seconds).await
}
