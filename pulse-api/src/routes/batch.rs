//! Batch REST API Routes
//!
//! `POST /api/batch/analyze` acquires up to 100 products in one request.
//! Each identifier gets its own result entry; per-item failures never fail
//! the request.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::services::{sanitize_batch, BatchOrchestrator};
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BatchAnalyzeRequest {
    /// Raw entries; non-string values are stringified before validation.
    pub asins: Vec<Value>,
}

impl BatchAnalyzeRequest {
    fn raw_identifiers(&self) -> Vec<String> {
        self.asins
            .iter()
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/batch/analyze - Acquire a list of products
///
/// Responds with one result per valid identifier, in request order.
pub async fn analyze(
    State(batch): State<BatchOrchestrator>,
    body: Result<Json<BatchAnalyzeRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body.map_err(|e| {
        ApiError::invalid_input("asins must be a non-empty array")
            .with_details(serde_json::json!({ "reason": e.body_text() }))
    })?;

    let asins = sanitize_batch(&request.raw_identifiers())?;
    let results = batch.process_all(&asins).await;
    Ok(Json(results))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze))
}
