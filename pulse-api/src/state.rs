//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use pulse_core::PulseConfig;
use pulse_provider::FetchClient;
use pulse_storage::{DualStore, ProductStore};

use crate::middleware::RequestRateState;
use crate::services::{AcquisitionService, AcquisitionSettings, BatchOrchestrator};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Tiered product acquisition.
    pub acquisition: Arc<AcquisitionService>,
    /// Chunked fan-out over [`AppState::acquisition`].
    pub batch: BatchOrchestrator,
    /// Value store shared by the product cache and request-rate counters.
    pub cache: Arc<DualStore>,
    /// Persistent product store, also probed by readiness checks.
    pub products: Arc<dyn ProductStore>,
    pub request_rate: RequestRateState,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: &PulseConfig,
        cache: Arc<DualStore>,
        products: Arc<dyn ProductStore>,
        fetch: Arc<FetchClient>,
    ) -> Self {
        let acquisition = Arc::new(AcquisitionService::new(
            cache.clone(),
            products.clone(),
            fetch,
            AcquisitionSettings::from_config(config),
        ));
        let batch = BatchOrchestrator::new(acquisition.clone(), config.batch_concurrency);
        let request_rate = RequestRateState::new(cache.clone(), config.request_rate.clone());

        Self {
            acquisition,
            batch,
            cache,
            products,
            request_rate,
            start_time: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("acquisition", &self.acquisition)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

crate::impl_from_ref!(Arc<AcquisitionService>, acquisition);
crate::impl_from_ref!(BatchOrchestrator, batch);
crate::impl_from_ref!(Arc<DualStore>, cache);
crate::impl_from_ref!(Arc<dyn ProductStore>, products);
crate::impl_from_ref!(Instant, start_time);
