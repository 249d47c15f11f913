//! Process-local value store.
//!
//! Best-effort: entries are lost on restart. Expiry is checked lazily on
//! access; nothing sweeps in the background. [`MemoryStore::purge_expired`]
//! is available for explicit maintenance.

use super::traits::{ValueStore, NO_EXPIRY};
use async_trait::async_trait;
use dashmap::DashMap;
use pulse_core::StorageError;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn new(value: String, ttl_seconds: u64, now: Instant) -> Self {
        let expires_at = if ttl_seconds == NO_EXPIRY {
            None
        } else {
            Some(now + Duration::from_secs(ttl_seconds))
        };
        Self { value, expires_at }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory backend built on a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl ValueStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = Instant::now();
        // The read guard must be released before removing the entry.
        let hit = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if hit {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StorageError> {
        let entry = MemoryEntry::new(value.to_string(), ttl_seconds, Instant::now());
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str, window_seconds: u64) -> Result<u64, StorageError> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| MemoryEntry::new("0".to_string(), window_seconds, now));
        if entry.is_expired(now) {
            *entry = MemoryEntry::new("0".to_string(), window_seconds, now);
        }
        let count = entry.value.parse::<u64>().unwrap_or(0).saturating_add(1);
        entry.value = count.to_string();
        Ok(count)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
