//! Health Check Endpoints
//!
//! Provides Kubernetes-compatible health check endpoints:
//! - /health/ping - Simple liveness check
//! - /health/ready - Product store and cache check
//! - /health/live - Process alive check
//!
//! Health endpoints are not request-rate limited.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use pulse_core::{ComponentHealth, HealthStatus};
use pulse_storage::{DualStore, ProductStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    pub components: Vec<ComponentHealth>,
    pub version: String,
    pub uptime_seconds: u64,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check
///
/// An unreachable product store makes the service unready (503). A cache
/// running on its in-process fallback only degrades it (200).
pub async fn readiness(
    State(cache): State<Arc<DualStore>>,
    State(products): State<Arc<dyn ProductStore>>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let store = check_product_store(products.as_ref()).await;
    let cache = check_cache(&cache);

    let overall_status = overall(&[&store, &cache]);
    let response = HealthResponse {
        status: overall_status,
        message: None,
        details: Some(HealthDetails {
            components: vec![store, cache],
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if overall_status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}

async fn check_product_store(products: &dyn ProductStore) -> ComponentHealth {
    let start = Instant::now();
    match products.ping().await {
        Ok(()) => ComponentHealth::new("product_store", HealthStatus::Healthy)
            .with_response_time(start.elapsed().as_millis() as i64),
        Err(e) => ComponentHealth::new("product_store", HealthStatus::Unhealthy)
            .with_message(format!("Product store check failed: {}", e)),
    }
}

fn check_cache(cache: &DualStore) -> ComponentHealth {
    let health = cache.health();
    let message = if !cache.has_networked_backend() {
        "No networked backend configured, serving from memory"
    } else if health.is_ready() {
        "Networked backend serving"
    } else {
        "Networked backend unavailable, serving from memory"
    };
    ComponentHealth::new("cache", HealthStatus::from(health)).with_message(message)
}

fn overall(components: &[&ComponentHealth]) -> HealthStatus {
    if components.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if components.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(liveness))
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
