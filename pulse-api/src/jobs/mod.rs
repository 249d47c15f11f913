//! Background Jobs for the AMZPulse API
//!
//! - `metrics_refresh`: cron-driven re-acquisition of tracked products
//!
//! # Usage
//!
//! The refresh scheduler is started during server startup when
//! `PULSE_ENABLE_METRICS_SYNC` is set, and stopped on shutdown:
//!
//! ```ignore
//! use pulse_api::jobs::{MetricsRefreshJob, MetricsRefreshScheduler, RefreshJobConfig};
//!
//! let settings = RefreshJobConfig::from_config(&config);
//! let job = Arc::new(MetricsRefreshJob::new(products, service, settings));
//! let scheduler = MetricsRefreshScheduler::start(job, &config.sync.cron).await?;
//!
//! // On shutdown
//! scheduler.stop().await?;
//! ```

pub mod metrics_refresh;

pub use metrics_refresh::{
    normalize_cron, MetricsRefreshJob, MetricsRefreshScheduler, RefreshJobConfig, RefreshMetrics,
    RefreshMetricsSnapshot, RefreshRunReport, SchedulerError,
};
