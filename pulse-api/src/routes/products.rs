//! Product REST API Routes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use pulse_core::Asin;

use crate::error::{ApiError, ApiResult};
use crate::services::AcquisitionService;
use crate::state::AppState;

fn parse_asin(raw: &str) -> ApiResult<Asin> {
    Asin::parse(raw).map_err(ApiError::from)
}

/// GET /api/products/:asin - Current normalized record
pub async fn get_product(
    State(service): State<Arc<AcquisitionService>>,
    Path(asin): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let asin = parse_asin(&asin)?;
    let product = service.acquire_or_fetch(&asin).await?;
    Ok(Json(product))
}

/// GET /api/products/:asin/history - Price and rank series
pub async fn get_product_history(
    State(service): State<Arc<AcquisitionService>>,
    Path(asin): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let asin = parse_asin(&asin)?;
    let history = service.get_history(&asin).await?;
    Ok(Json(history))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/:asin", get(get_product))
        .route("/:asin/history", get(get_product_history))
}
