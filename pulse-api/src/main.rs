//! AMZPulse API Server Entry Point
//!
//! Bootstraps configuration, connects the cache and product store, starts
//! the optional metrics refresh scheduler, and serves the Axum router.

use std::net::SocketAddr;
use std::sync::Arc;

use pulse_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, DbConfig, MetricsRefreshJob,
    MetricsRefreshScheduler, PgProductStore, ProductStoreKind, RefreshJobConfig,
};
use pulse_api::telemetry::{init_tracing, TelemetryConfig};
use pulse_core::{PulseConfig, PulseError};
use pulse_provider::FetchClient;
use pulse_storage::{DualStore, InMemoryProductStore, ProductStore};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    init_tracing(&telemetry_config)?;

    let config = PulseConfig::from_env();
    config.validate().map_err(PulseError::from)?;
    let api_config = ApiConfig::from_env();
    let addr = api_config.bind_addr()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let cache = Arc::new(DualStore::connect(&config.cache).await);
    let probe = cache.spawn_health_probe(config.cache.probe_interval, shutdown_rx.clone());

    let products = build_product_store(&api_config).await?;

    let fetch = FetchClient::from_config(&config.provider).map_err(|e| {
        ApiError::internal_error(format!("Failed to initialize provider: {}", e))
    })?;
    tracing::info!(provider = fetch.provider_name(), "Provider selected");

    let state = AppState::new(&config, cache, products.clone(), Arc::new(fetch));

    let scheduler = if config.sync.enabled {
        let job = Arc::new(MetricsRefreshJob::new(
            products,
            state.acquisition.clone(),
            RefreshJobConfig::from_config(&config),
        ));
        match MetricsRefreshScheduler::start(job, &config.sync.cron).await {
            Ok(scheduler) => Some(scheduler),
            Err(e) => {
                tracing::error!(error = %e, "Metrics refresh scheduler failed to start");
                None
            }
        }
    } else {
        tracing::info!("Metrics refresh disabled");
        None
    };

    let app = create_api_router(state);

    tracing::info!(%addr, "Starting AMZPulse API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    if let Some(scheduler) = scheduler {
        if let Err(e) = scheduler.stop().await {
            tracing::warn!(error = %e, "Metrics refresh scheduler did not stop cleanly");
        }
    }
    let _ = shutdown_tx.send(true);
    let _ = probe.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn build_product_store(api_config: &ApiConfig) -> ApiResult<Arc<dyn ProductStore>> {
    match api_config.product_store {
        ProductStoreKind::Memory => {
            tracing::warn!("Using in-memory product store; records are lost on restart");
            Ok(Arc::new(InMemoryProductStore::new()))
        }
        ProductStoreKind::Postgres => {
            let db_config = DbConfig::from_env();
            let store = PgProductStore::new(db_config.create_pool()?);
            if api_config.ensure_schema {
                if let Err(e) = store.ensure_schema().await {
                    tracing::warn!(error = %e, "Schema setup failed");
                }
            }
            Ok(Arc::new(store))
        }
    }
}
