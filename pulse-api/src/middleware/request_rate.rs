//! Fixed-window request-rate limiting
//!
//! Each client gets one counter per window, stored in the shared
//! [`ValueStore`] under `<prefix><client>:<window index>`. Counters live in
//! Redis when it is reachable and in the in-process fallback otherwise, so a
//! Redis outage degrades to per-instance limits instead of none. Closed
//! windows expire in Redis by TTL and in the fallback through the cache
//! maintenance task.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use pulse_core::RequestRateConfig;
use pulse_storage::ValueStore;

use crate::constants::{RATE_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER, UNKNOWN_CLIENT};
use crate::error::ApiError;

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct RequestRateState {
    store: Arc<dyn ValueStore>,
    config: RequestRateConfig,
}

impl RequestRateState {
    pub fn new(store: Arc<dyn ValueStore>, config: RequestRateConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RequestRateConfig {
        &self.config
    }

    fn window_ms(&self) -> u64 {
        (self.config.window.as_millis() as u64).max(1)
    }

    /// Counter lifetime; at least one second so the store can expire it.
    fn window_secs(&self) -> u64 {
        self.window_ms().div_ceil(1000).max(1)
    }
}

impl std::fmt::Debug for RequestRateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRateState")
            .field("backend", &self.store.backend_name())
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// KEYS AND WINDOWS
// ============================================================================

/// Index of the fixed window containing `now_ms`.
pub fn window_index(now_ms: u64, window_ms: u64) -> u64 {
    now_ms / window_ms.max(1)
}

/// Whole seconds until the window containing `now_ms` closes, at least 1.
pub fn retry_after_secs(now_ms: u64, window_ms: u64) -> u64 {
    let window_ms = window_ms.max(1);
    let remaining_ms = window_ms - (now_ms % window_ms);
    remaining_ms.div_ceil(1000).max(1)
}

pub fn rate_key(prefix: &str, client: &str, window: u64) -> String {
    format!("{}{}:{}", prefix, client, window)
}

/// Identify the caller, considering proxy headers.
///
/// Order: first `x-forwarded-for` entry, then `x-real-ip`, then the peer
/// address. Requests with none of these share the `unknown` bucket.
pub fn client_key(request: &Request) -> String {
    let headers = request.headers();

    if let Some(forwarded_for) = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(first) = forwarded_for.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// ============================================================================
// MIDDLEWARE
// ============================================================================

/// Rejection returned once a client exceeds its window budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestRateError {
    pub retry_after: u64,
    pub limit: u64,
}

impl IntoResponse for RequestRateError {
    fn into_response(self) -> Response {
        let error = ApiError::too_many_requests(Some(self.retry_after));
        let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(error)).into_response();
        let headers = response.headers_mut();
        headers.insert(
            HeaderName::from_static("retry-after"),
            HeaderValue::from(self.retry_after),
        );
        headers.insert(
            HeaderName::from_static(RATE_LIMIT_HEADER),
            HeaderValue::from(self.limit),
        );
        headers.insert(
            HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
            HeaderValue::from(0u64),
        );
        response
    }
}

/// Count the request against its client window and reject it past the limit.
///
/// A counter that cannot be incremented lets the request through.
pub async fn request_rate_middleware(
    State(state): State<RequestRateState>,
    request: Request,
    next: Next,
) -> Result<Response, RequestRateError> {
    let client = client_key(&request);
    let now = now_ms();
    let window_ms = state.window_ms();
    let key = rate_key(
        &state.config.key_prefix,
        &client,
        window_index(now, window_ms),
    );
    let limit = state.config.max_requests;

    let count = match state.store.increment(&key, state.window_secs()).await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(client = %client, error = %e, "Request-rate counter unavailable");
            return Ok(next.run(request).await);
        }
    };

    if count > limit {
        let retry_after = retry_after_secs(now, window_ms);
        tracing::debug!(client = %client, count, limit, retry_after, "Request rate exceeded");
        return Err(RequestRateError { retry_after, limit });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(HeaderName::from_static(RATE_LIMIT_HEADER), HeaderValue::from(limit));
    headers.insert(
        HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
        HeaderValue::from(limit.saturating_sub(count)),
    );
    Ok(response)
}

// ============================================================================
// TESTS
// ============================================================================
