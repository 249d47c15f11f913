//! API Configuration Module
//!
//! Server-level settings for the HTTP surface. Pipeline settings live in
//! [`pulse_core::PulseConfig`]; database settings in [`crate::db::DbConfig`].

use crate::constants::{DEFAULT_BIND_HOST, DEFAULT_PORT};
use crate::error::{ApiError, ApiResult};
use pulse_core::parse_bool;
use std::net::SocketAddr;

/// Backend for persisted products and metric snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductStoreKind {
    Postgres,
    /// Process-local; contents are lost on restart.
    #[default]
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Host or IP to bind (`PULSE_API_BIND`).
    pub bind_host: String,

    /// Raw port value (`PORT`). Validated by [`ApiConfig::bind_addr`].
    pub port: String,

    /// `PULSE_PRODUCT_STORE`; defaults to Postgres when `PULSE_DB_HOST` is set.
    pub product_store: ProductStoreKind,

    /// Create tables at startup (`PULSE_DB_ENSURE_SCHEMA`). Development only.
    pub ensure_schema: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT.to_string(),
            product_store: ProductStoreKind::default(),
            ensure_schema: false,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            bind_host: lookup("PULSE_API_BIND").unwrap_or(defaults.bind_host),
            port: lookup("PORT").unwrap_or(defaults.port),
            product_store: match lookup("PULSE_PRODUCT_STORE").as_deref().map(str::trim) {
                Some(kind) if kind.eq_ignore_ascii_case("postgres") => ProductStoreKind::Postgres,
                Some(kind) if kind.eq_ignore_ascii_case("memory") => ProductStoreKind::Memory,
                _ if lookup("PULSE_DB_HOST").is_some() => ProductStoreKind::Postgres,
                _ => defaults.product_store,
            },
            ensure_schema: lookup("PULSE_DB_ENSURE_SCHEMA")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.ensure_schema),
        }
    }

    /// Resolve the socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let port = self
            .port
            .trim()
            .parse::<u16>()
            .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", self.port)))?;

        let addr = format!("{}:{}", self.bind_host, port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind_addr() {
        let addr = ApiConfig::default().bind_addr().unwrap();
        assert_eq!(addr, "0.0.0.0:3001".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_env_overrides() {
        let config = ApiConfig::from_lookup(|key| match key {
            "PULSE_API_BIND" => Some("127.0.0.1".to_string()),
            "PORT" => Some("8080".to_string()),
            _ => None,
        });
        assert_eq!(
            config.bind_addr().unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_product_store_selection() {
        assert_eq!(ApiConfig::from_lookup(|_| None).product_store, ProductStoreKind::Memory);

        let config = ApiConfig::from_lookup(|key| match key {
            "PULSE_DB_HOST" => Some("db.internal".to_string()),
            "PULSE_DB_ENSURE_SCHEMA" => Some("yes".to_string()),
            _ => None,
        });
        assert_eq!(config.product_store, ProductStoreKind::Postgres);
        assert!(config.ensure_schema);

        let config = ApiConfig::from_lookup(|key| match key {
            "PULSE_DB_HOST" => Some("db.internal".to_string()),
            "PULSE_PRODUCT_STORE" => Some("Memory".to_string()),
            _ => None,
        });
        assert_eq!(config.product_store, ProductStoreKind::Memory);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let config = ApiConfig {
            port: "http".to_string(),
            ..ApiConfig::default()
        };
        assert!(config.bind_addr().is_err());
    }
}
