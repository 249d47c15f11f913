//! Shared harness for HTTP-level tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use pulse_api::{create_api_router, AppState};
use pulse_core::{PulseConfig, RequestRateConfig};
use pulse_provider::{AdmissionLimiter, FetchClient, RetryPolicy};
use pulse_storage::{DualStore, InMemoryProductStore};
use pulse_test_utils::{FlakyProductStore, ScriptedProvider};
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<FlakyProductStore>,
    pub provider: Arc<ScriptedProvider>,
}

impl TestApp {
    pub fn new(provider: ScriptedProvider) -> Self {
        Self::with_config(provider, PulseConfig::default())
    }

    pub fn with_rate_limit(provider: ScriptedProvider, max_requests: u64) -> Self {
        let config = PulseConfig {
            request_rate: RequestRateConfig {
                window: Duration::from_secs(3600),
                max_requests,
                key_prefix: "rl:test:".to_string(),
            },
            ..PulseConfig::default()
        };
        Self::with_config(provider, config)
    }

    pub fn with_config(provider: ScriptedProvider, config: PulseConfig) -> Self {
        let store = Arc::new(FlakyProductStore::new(InMemoryProductStore::new()));
        let provider = Arc::new(provider);
        let fetch = FetchClient::new(
            provider.clone(),
            Arc::new(AdmissionLimiter::new(Duration::from_secs(60), 1_000)),
            RetryPolicy::no_retry(),
            Duration::from_secs(10),
        );
        let state = AppState::new(
            &config,
            Arc::new(DualStore::memory_only()),
            store.clone(),
            Arc::new(fetch),
        );
        Self {
            state,
            store,
            provider,
        }
    }

    pub fn router(&self) -> Router {
        create_api_router(self.state.clone())
    }

    pub async fn get(&self, uri: &str) -> (u16, Value) {
        let request = Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .expect("request builds");
        send(self.router(), request).await
    }

    pub async fn post_json(&self, uri: &str, body: &str) -> (u16, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from(body.to_string()))
            .expect("request builds");
        send(self.router(), request).await
    }
}

pub async fn send(router: Router, request: Request<Body>) -> (u16, Value) {
    let response = router.oneshot(request).await.expect("router is infallible");
    let (status, _, body) = into_parts(response).await;
    (status, body)
}

pub async fn into_parts(response: Response<Body>) -> (u16, axum::http::HeaderMap, Value) {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body collects");
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, headers, body)
}
