//! Constants for the AMZPulse API
//!
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host when `PULSE_API_BIND` is unset
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default port when `PORT` is unset
pub const DEFAULT_PORT: u16 = 3001;

// ============================================================================
// BATCH
// ============================================================================

/// Maximum identifiers accepted by one batch request
pub const MAX_BATCH_ITEMS: usize = 100;

// ============================================================================
// REQUEST RATE
// ============================================================================

/// Client key used when neither proxy headers nor the peer address are known
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Header carrying the configured per-window request limit
pub const RATE_LIMIT_HEADER: &str = "x-ratelimit-limit";

/// Header carrying the requests left in the current window
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

// ============================================================================
// DATABASE
// ============================================================================

/// Default connection pool size
pub const DEFAULT_DB_POOL_SIZE: usize = 16;

/// Default wait for a pooled connection, in seconds
pub const DEFAULT_DB_POOL_TIMEOUT_SECS: u64 = 5;
