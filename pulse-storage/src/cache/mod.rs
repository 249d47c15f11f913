//! Dual-backend value store.
//!
//! A TTL key/value abstraction with a preferred networked backend and an
//! automatic in-process fallback. Used for product caching and for HTTP
//! request-rate counters.
//!
//! # Backends
//!
//! - [`RedisStore`]: shared, authoritative while reachable
//! - [`MemoryStore`]: process-local, lost on restart
//! - [`DualStore`]: routes to Redis while `Ready`, otherwise to memory
//!
//! Cached values are read-through accelerators. They are never
//! authoritative over the persistent product store; the TTL bounds their
//! staleness.

pub mod dual;
pub mod memory;
pub mod redis_store;
pub mod traits;

pub use dual::{DualStore, DualStoreMetrics, DualStoreSnapshot};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use traits::{get_json, set_json, ValueStore, NO_EXPIRY};
