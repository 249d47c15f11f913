//! Service Layer
//!
//! Acquisition, normalization and batch orchestration. Route handlers stay
//! thin and delegate here.

pub mod acquisition;
pub mod batch;
pub mod normalize;

pub use acquisition::{
    AcquisitionMetrics, AcquisitionMetricsSnapshot, AcquisitionService, AcquisitionSettings,
};
pub use batch::{run_chunked, sanitize_batch, BatchItemResult, BatchOrchestrator, BatchSummary};
pub use normalize::{normalize, placeholder_image};
