//! AMZPulse API - Acquisition Pipeline and HTTP Surface
//!
//! This crate wires the tiered acquisition pipeline (cache, persistent
//! store, admission-controlled provider fetch) behind a thin Axum REST
//! surface, and runs the scheduled metrics refresh job.
//!
//! Persistent records live in PostgreSQL via deadpool-postgres, or in an
//! in-process store for development and tests.

pub mod macros;

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod pg_store;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, ProductStoreKind};
pub use db::DbConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{MetricsRefreshJob, MetricsRefreshScheduler, RefreshJobConfig};
pub use middleware::{request_rate_middleware, RequestRateState};
pub use pg_store::PgProductStore;
pub use routes::create_api_router;
pub use services::{
    AcquisitionService, AcquisitionSettings, BatchItemResult, BatchOrchestrator, BatchSummary,
};
pub use state::AppState;
