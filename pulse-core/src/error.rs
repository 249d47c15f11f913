//! Error types for AMZPulse operations

use thiserror::Error;

/// Input validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid identifier {value:?}: expected 10 alphanumeric characters")]
    InvalidIdentifier { value: String },

    #[error("Batch is empty: at least one valid identifier is required")]
    EmptyBatch,

    #[error("Batch too large: {count} items exceeds the limit of {max}")]
    BatchTooLarge { count: usize, max: usize },
}

/// Cache and persistent-store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Backend {backend} unreachable: {reason}")]
    Unreachable { backend: String, reason: String },

    #[error("Query failed on {backend}: {reason}")]
    QueryFailed { backend: String, reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },
}

impl StorageError {
    pub fn unreachable(backend: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unreachable {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    pub fn query_failed(backend: impl Into<String>, reason: impl ToString) -> Self {
        Self::QueryFailed {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }
}

/// Upstream product provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("No product provider configured")]
    NotConfigured,

    #[error("Transport error talking to {provider}: {reason}")]
    Transport { provider: String, reason: String },

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Product {asin} not found at {provider}")]
    ProductNotFound { provider: String, asin: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },
}

impl ProviderError {
    /// True when the provider positively reported the identifier as unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProductNotFound { .. })
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all AMZPulse errors.
#[derive(Debug, Clone, Error)]
pub enum PulseError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Product {asin} not found")]
    NotFound { asin: String },

    #[error("Upstream provider failed for {asin} after {attempts} attempt(s): {source}")]
    Upstream {
        asin: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for AMZPulse operations.
pub type PulseResult<T> = Result<T, PulseError>;

// =============================================================================
// TESTS
// =============================================================================
