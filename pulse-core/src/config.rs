//! Pipeline configuration
//!
//! Loaded from `PULSE_*` environment variables with defaults suitable for
//! local development. [`PulseConfig::from_lookup`] takes any key lookup so
//! tests never have to mutate the process environment.

use crate::ConfigError;
use std::time::Duration;

// ============================================================================
// SECTIONS
// ============================================================================

/// Dual-backend value store settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Redis connection URL. `None` means memory-only.
    pub redis_url: Option<String>,
    /// Per-operation timeout against Redis.
    pub redis_timeout: Duration,
    /// Interval of the background readiness probe.
    pub probe_interval: Duration,
    /// TTL applied to cached product records.
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_timeout: Duration::from_millis(250),
            probe_interval: Duration::from_secs(15),
            ttl_seconds: 120,
        }
    }
}

/// Upstream provider, admission and retry settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Base URL of the HTTP provider. `None` selects the mock provider.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Admissions per window. Values below 1 are treated as 1.
    pub rate_limit_per_window: u32,
    pub window: Duration,
    pub retry_attempts: u32,
    pub retry_base: Duration,
    /// Timeout applied to each individual attempt.
    pub timeout: Duration,
    /// Simulated latency of the mock provider.
    pub mock_latency: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            rate_limit_per_window: 60,
            window: Duration::from_millis(60_000),
            retry_attempts: 3,
            retry_base: Duration::from_millis(200),
            timeout: Duration::from_millis(10_000),
            mock_latency: Duration::from_millis(500),
        }
    }
}

/// Scheduled metrics refresh settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub enabled: bool,
    /// Five-field cron expression (minute first).
    pub cron: String,
    pub batch_size: usize,
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cron: "*/15 * * * *".to_string(),
            batch_size: 10,
            concurrency: 3,
        }
    }
}

/// Per-client HTTP request-rate settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRateConfig {
    pub window: Duration,
    pub max_requests: u64,
    pub key_prefix: String,
}

impl Default for RequestRateConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(60_000),
            max_requests: 100,
            key_prefix: "rl:".to_string(),
        }
    }
}

// ============================================================================
// MASTER CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PulseConfig {
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
    pub sync: SyncConfig,
    pub request_rate: RequestRateConfig,
    /// Age below which a persisted product short-circuits the provider.
    pub freshness_threshold: Duration,
    /// Snapshots read back to reconstruct history.
    pub history_limit: usize,
    /// Items processed concurrently per batch chunk.
    pub batch_concurrency: usize,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            provider: ProviderConfig::default(),
            sync: SyncConfig::default(),
            request_rate: RequestRateConfig::default(),
            freshness_threshold: Duration::from_millis(300_000),
            history_limit: 30,
            batch_concurrency: 5,
        }
    }
}

impl PulseConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Unset keys and unparseable numbers fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let num = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };
        let millis = |key: &str, default: Duration| {
            Duration::from_millis(num(key, default.as_millis() as u64))
        };

        Self {
            cache: CacheConfig {
                redis_url: get("PULSE_REDIS_URL"),
                redis_timeout: millis("PULSE_REDIS_TIMEOUT_MS", d.cache.redis_timeout),
                probe_interval: Duration::from_secs(num(
                    "PULSE_REDIS_PROBE_INTERVAL_SECS",
                    d.cache.probe_interval.as_secs(),
                )),
                ttl_seconds: num("PULSE_CACHE_TTL_SECONDS", d.cache.ttl_seconds),
            },
            provider: ProviderConfig {
                base_url: get("PULSE_PROVIDER_BASE_URL"),
                api_key: get("PULSE_PROVIDER_API_KEY"),
                rate_limit_per_window: num(
                    "PULSE_PROVIDER_RATE_LIMIT_PER_MIN",
                    u64::from(d.provider.rate_limit_per_window),
                )
                .min(u64::from(u32::MAX)) as u32,
                window: millis("PULSE_PROVIDER_WINDOW_MS", d.provider.window),
                retry_attempts: num(
                    "PULSE_PROVIDER_RETRY_ATTEMPTS",
                    u64::from(d.provider.retry_attempts),
                )
                .min(u64::from(u32::MAX)) as u32,
                retry_base: millis("PULSE_PROVIDER_RETRY_BASE_MS", d.provider.retry_base),
                timeout: millis("PULSE_PROVIDER_TIMEOUT_MS", d.provider.timeout),
                mock_latency: millis("PULSE_PROVIDER_MOCK_LATENCY_MS", d.provider.mock_latency),
            },
            sync: SyncConfig {
                enabled: get("PULSE_ENABLE_METRICS_SYNC")
                    .map(|v| parse_bool(&v))
                    .unwrap_or(d.sync.enabled),
                cron: get("PULSE_SYNC_CRON").unwrap_or(d.sync.cron),
                batch_size: num("PULSE_SYNC_BATCH_SIZE", d.sync.batch_size as u64) as usize,
                concurrency: num("PULSE_SYNC_CONCURRENCY", d.sync.concurrency as u64) as usize,
            },
            request_rate: RequestRateConfig {
                window: millis("PULSE_RATE_LIMIT_WINDOW_MS", d.request_rate.window),
                max_requests: num("PULSE_RATE_LIMIT_MAX", d.request_rate.max_requests),
                key_prefix: get("PULSE_RATE_LIMIT_PREFIX").unwrap_or(d.request_rate.key_prefix),
            },
            freshness_threshold: millis("PULSE_DB_FRESH_MS", d.freshness_threshold),
            history_limit: num("PULSE_HISTORY_LIMIT", d.history_limit as u64) as usize,
            batch_concurrency: num("PULSE_BATCH_CONCURRENCY", d.batch_concurrency as u64) as usize,
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero("PULSE_PROVIDER_WINDOW_MS", self.provider.window.as_millis() as u64)?;
        require_nonzero("PULSE_PROVIDER_RETRY_ATTEMPTS", u64::from(self.provider.retry_attempts))?;
        require_nonzero("PULSE_PROVIDER_TIMEOUT_MS", self.provider.timeout.as_millis() as u64)?;
        require_nonzero("PULSE_BATCH_CONCURRENCY", self.batch_concurrency as u64)?;
        require_nonzero("PULSE_SYNC_BATCH_SIZE", self.sync.batch_size as u64)?;
        require_nonzero("PULSE_SYNC_CONCURRENCY", self.sync.concurrency as u64)?;
        require_nonzero("PULSE_RATE_LIMIT_WINDOW_MS", self.request_rate.window.as_millis() as u64)?;
        require_nonzero("PULSE_REDIS_PROBE_INTERVAL_SECS", self.cache.probe_interval.as_secs())?;

        let fields = self.sync.cron.split_whitespace().count();
        if fields != 5 && fields != 6 {
            return Err(ConfigError::InvalidValue {
                field: "PULSE_SYNC_CRON".to_string(),
                value: self.sync.cron.clone(),
                reason: format!("expected 5 or 6 fields, got {}", fields),
            });
        }
        Ok(())
    }
}

pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn require_nonzero(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
