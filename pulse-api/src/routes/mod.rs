//! REST API Routes Module
//!
//! - Product lookups and history (`/api/products`)
//! - Batch acquisition (`/api/batch`)
//! - Health check endpoints (`/health`, Kubernetes-compatible)
//!
//! Every `/api` route is request-rate limited. All routes are traced and
//! CORS-permissive for browser clients.

pub mod batch;
pub mod health;
pub mod products;

use axum::{middleware::from_fn_with_state, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, map_response_body::MapResponseBodyLayer, trace::TraceLayer};

use crate::middleware::request_rate_middleware;
use crate::state::AppState;

pub use batch::create_router as batch_router;
pub use health::create_router as health_router;
pub use products::create_router as products_router;

/// Build the `/api` routes, request-rate limited.
fn build_api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/products", products::create_router())
        .nest("/batch", batch::create_router())
        .layer(from_fn_with_state(
            state.request_rate.clone(),
            request_rate_middleware,
        ))
}

/// Build the complete application router.
///
/// # Middleware Order (outer to inner)
/// 1. CORS (outermost) - handles preflight requests
/// 2. Tracing - one span per request
/// 3. Request rate (only on /api/*)
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", build_api_routes(&state))
        .nest("/health", health::create_router())
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                // Cors requires a `Default` response body; erase Trace's body type.
                .layer(MapResponseBodyLayer::new(axum::body::Body::new))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}
