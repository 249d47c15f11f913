//! HTTP surface tests
//!
//! Drive the full router with `oneshot` requests against an in-memory
//! product store, a memory-only cache and a scripted provider.

use axum::body::Body;
use axum::http::Request;
use pulse_api::RequestRateState;
use pulse_core::{Asin, ProviderError, RequestRateConfig};
use pulse_storage::ProductStore;
use pulse_test_utils::{sample_payload, sample_product, FailingValueStore, ScriptedProvider};
use std::sync::Arc;
use std::time::Duration;

#[path = "support/app.rs"]
mod app_support;
use app_support::{into_parts, send, TestApp};

const ASIN: &str = "B07XJWD7Z3";

fn asin() -> Asin {
    Asin::parse(ASIN).unwrap()
}

fn healthy_provider() -> ScriptedProvider {
    ScriptedProvider::by_asin(|asin| Ok(sample_payload(asin)))
}

// ============================================================================
// PRODUCTS
// ============================================================================

#[tokio::test]
async fn get_product_fetches_then_serves_from_cache() {
    let app = TestApp::new(healthy_provider());

    let (status, body) = app.get(&format!("/api/products/{}", ASIN)).await;
    assert_eq!(status, 200);
    assert_eq!(body["asin"], ASIN);
    assert_eq!(body["brand"], "Acme");
    assert!(body["updatedAt"].is_string());

    let (status, again) = app.get(&format!("/api/products/{}", ASIN)).await;
    assert_eq!(status, 200);
    assert_eq!(again["asin"], body["asin"]);
    assert_eq!(again["updatedAt"], body["updatedAt"]);
    assert_eq!(app.provider.calls(), 1);
}

#[tokio::test]
async fn get_product_accepts_lowercase_identifier() {
    let app = TestApp::new(healthy_provider());

    let (status, body) = app.get("/api/products/b07xjwd7z3").await;
    assert_eq!(status, 200);
    assert_eq!(body["asin"], ASIN);
}

#[tokio::test]
async fn get_product_rejects_malformed_identifier() {
    let app = TestApp::new(healthy_provider());

    let (status, body) = app.get("/api/products/not-an-asin").await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "INVALID_IDENTIFIER");
    assert_eq!(app.provider.calls(), 0);
}

#[tokio::test]
async fn unknown_product_is_404() {
    let app = TestApp::new(ScriptedProvider::failing(ProviderError::ProductNotFound {
        provider: "scripted".to_string(),
        asin: ASIN.to_string(),
    }));

    let (status, body) = app.get(&format!("/api/products/{}", ASIN)).await;
    assert_eq!(status, 404);
    assert_eq!(body["code"], "PRODUCT_NOT_FOUND");
}

#[tokio::test]
async fn provider_outage_is_502() {
    let app = TestApp::new(ScriptedProvider::failing(ProviderError::RequestFailed {
        provider: "scripted".to_string(),
        status: 503,
        message: "maintenance".to_string(),
    }));

    let (status, body) = app.get(&format!("/api/products/{}", ASIN)).await;
    assert_eq!(status, 502);
    assert_eq!(body["code"], "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn history_is_served_from_fresh_persistent_record() {
    let app = TestApp::new(healthy_provider());
    let now = chrono::Utc::now();
    let product = sample_product(&asin(), now);
    app.store.inner().product_upsert(&product).await.unwrap();
    for days_ago in [2, 1, 0] {
        let snapshot = pulse_core::MetricSnapshot::capture(
            &product,
            now - chrono::Duration::days(days_ago),
        );
        app.store.inner().snapshot_append(&snapshot).await.unwrap();
    }

    let (status, body) = app.get(&format!("/api/products/{}/history", ASIN)).await;
    assert_eq!(status, 200);
    assert_eq!(body["priceHistory"].as_array().unwrap().len(), 3);
    assert_eq!(body["bsrHistory"].as_array().unwrap().len(), 3);
    assert_eq!(app.provider.calls(), 0);
}

// ============================================================================
// BATCH
// ============================================================================

#[tokio::test]
async fn batch_returns_one_result_per_identifier() {
    let bad = Asin::parse("B000000002").unwrap();
    let provider = ScriptedProvider::by_asin(move |asin| {
        if *asin == bad {
            Err(ProviderError::Timeout {
                provider: "scripted".to_string(),
                timeout_ms: 10_000,
            })
        } else {
            Ok(sample_payload(asin))
        }
    });
    let app = TestApp::new(provider);

    let (status, body) = app
        .post_json(
            "/api/batch/analyze",
            r#"{"asins": ["b000000001", "B000000002", "junk", "B000000003"]}"#,
        )
        .await;

    assert_eq!(status, 200);
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["status"], "ok");
    assert_eq!(results[0]["asin"], "B000000001");
    assert_eq!(results[1]["status"], "error");
    assert_eq!(results[1]["code"], "UPSTREAM_UNAVAILABLE");
    assert_eq!(results[2]["status"], "ok");
    assert_eq!(results[2]["product"]["asin"], "B000000003");
}

#[tokio::test]
async fn batch_over_limit_is_413() {
    let app = TestApp::new(healthy_provider());
    let asins: Vec<String> = (0..101).map(|i| format!("B{:09}", i)).collect();
    let body = serde_json::json!({ "asins": asins }).to_string();

    let (status, body) = app.post_json("/api/batch/analyze", &body).await;
    assert_eq!(status, 413);
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(app.provider.calls(), 0);
}

#[tokio::test]
async fn batch_without_valid_identifiers_is_400() {
    let app = TestApp::new(healthy_provider());

    for payload in [r#"{"asins": []}"#, r#"{"asins": ["nope", "  "]}"#] {
        let (status, body) = app.post_json("/api/batch/analyze", payload).await;
        assert_eq!(status, 400, "payload {payload}");
        assert_eq!(body["code"], "VALIDATION_FAILED");
    }
}

#[tokio::test]
async fn batch_with_malformed_body_is_400() {
    let app = TestApp::new(healthy_provider());

    for payload in [r#"{"asins": "B000000001"}"#, r#"{}"#, "not json"] {
        let (status, body) = app.post_json("/api/batch/analyze", payload).await;
        assert_eq!(status, 400, "payload {payload}");
        assert_eq!(body["code"], "INVALID_INPUT");
    }
}

// ============================================================================
// HEALTH
// ============================================================================

#[tokio::test]
async fn ping_and_live_respond() {
    let app = TestApp::new(healthy_provider());

    let (status, body) = app.get("/health/ping").await;
    assert_eq!(status, 200);
    assert_eq!(body, "pong");

    let (status, body) = app.get("/health/live").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn ready_is_degraded_on_memory_only_cache() {
    let app = TestApp::new(healthy_provider());

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "degraded");
    let components = body["details"]["components"].as_array().unwrap();
    assert_eq!(components[0]["component"], "product_store");
    assert_eq!(components[0]["status"], "healthy");
    assert_eq!(components[1]["component"], "cache");
    assert_eq!(components[1]["status"], "degraded");
}

#[tokio::test]
async fn ready_is_503_when_product_store_unreachable() {
    let app = TestApp::new(healthy_provider());
    app.store.set_unreachable(true);

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, 503);
    assert_eq!(body["status"], "unhealthy");
}

// ============================================================================
// REQUEST RATE
// ============================================================================

#[tokio::test]
async fn api_requests_past_limit_are_429() {
    let app = TestApp::with_rate_limit(healthy_provider(), 2);
    let uri = format!("/api/products/{}", ASIN);

    assert_eq!(app.get(&uri).await.0, 200);
    assert_eq!(app.get(&uri).await.0, 200);

    let request = Request::builder()
        .uri(&uri)
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router(), request).await.unwrap();
    let (status, headers, body) = into_parts(response).await;
    assert_eq!(status, 429);
    assert_eq!(body["code"], "TOO_MANY_REQUESTS");
    assert!(headers.contains_key("retry-after"));

    // A different client still has budget.
    let request = Request::builder()
        .uri(&uri)
        .header("x-forwarded-for", "198.51.100.1")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(app.router(), request).await.0, 200);
}

#[tokio::test]
async fn health_routes_are_not_rate_limited() {
    let app = TestApp::with_rate_limit(healthy_provider(), 1);

    for _ in 0..5 {
        assert_eq!(app.get("/health/ping").await.0, 200);
    }
}

#[tokio::test]
async fn unavailable_counter_store_lets_requests_through() {
    let mut app = TestApp::new(healthy_provider());
    app.state.request_rate = RequestRateState::new(
        Arc::new(FailingValueStore),
        RequestRateConfig {
            window: Duration::from_secs(60),
            max_requests: 1,
            key_prefix: "rl:".to_string(),
        },
    );

    for _ in 0..3 {
        let (status, _) = app.get(&format!("/api/products/{}", ASIN)).await;
        assert_eq!(status, 200);
    }
}
