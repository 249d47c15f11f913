//! Scheduled Metrics Refresh
//!
//! Periodically re-acquires a page of tracked products from the provider so
//! their snapshots keep accumulating without client traffic.
//!
//! Each run:
//!
//! 1. Lists up to `batch_size` identifiers, least recently updated first.
//!    Refreshed products move to the back, so the page rotates.
//! 2. Force-refreshes them in chunks of `concurrency` using the same
//!    chunking as batch requests.
//! 3. Logs and counts per-identifier failures without stopping the page.
//!
//! A listing failure ends the run early and is counted as a run failure.
//! Nothing here is ever fatal to the host process.
//!
//! # Usage
//!
//! ```ignore
//! let settings = RefreshJobConfig::from_config(&config);
//! let job = Arc::new(MetricsRefreshJob::new(products, service, settings));
//! let scheduler = MetricsRefreshScheduler::start(job, &config.sync.cron).await?;
//! // On shutdown
//! scheduler.stop().await?;
//! ```

use crate::services::{run_chunked, AcquisitionService};
use pulse_core::{PulseConfig, SyncConfig};
use pulse_storage::ProductStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshJobConfig {
    /// Identifiers listed per run (default: 10)
    pub batch_size: usize,

    /// Concurrent refreshes per chunk (default: 3)
    pub concurrency: usize,
}

impl Default for RefreshJobConfig {
    fn default() -> Self {
        Self::from_sync(&SyncConfig::default())
    }
}

impl RefreshJobConfig {
    pub fn from_sync(sync: &SyncConfig) -> Self {
        Self {
            batch_size: sync.batch_size.max(1),
            concurrency: sync.concurrency.max(1),
        }
    }

    pub fn from_config(config: &PulseConfig) -> Self {
        Self::from_sync(&config.sync)
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Invalid cron expression {expr:?}: {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("Scheduler error: {reason}")]
    Scheduler { reason: String },
}

impl SchedulerError {
    fn scheduler(err: impl std::fmt::Debug) -> Self {
        Self::Scheduler {
            reason: format!("{:?}", err),
        }
    }
}

/// Convert a 5-field cron expression to the seconds-first form the
/// scheduler expects. 6-field expressions pass through unchanged.
pub fn normalize_cron(expr: &str) -> Result<String, SchedulerError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 => Ok(fields.join(" ")),
        n => Err(SchedulerError::InvalidCron {
            expr: expr.to_string(),
            reason: format!("expected 5 or 6 fields, found {}", n),
        }),
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters across all runs since startup.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
    /// Runs that listed identifiers, including empty pages
    pub runs: AtomicU64,

    /// Runs that failed to list identifiers
    pub run_failures: AtomicU64,

    /// Triggers skipped because the previous run was still going
    pub skipped_overlaps: AtomicU64,

    /// Identifiers refreshed successfully
    pub refreshed: AtomicU64,

    /// Identifiers whose refresh failed
    pub failed: AtomicU64,
}

impl RefreshMetrics {
    pub fn snapshot(&self) -> RefreshMetricsSnapshot {
        RefreshMetricsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            run_failures: self.run_failures.load(Ordering::Relaxed),
            skipped_overlaps: self.skipped_overlaps.load(Ordering::Relaxed),
            refreshed: self.refreshed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshMetricsSnapshot {
    pub runs: u64,
    pub run_failures: u64,
    pub skipped_overlaps: u64,
    pub refreshed: u64,
    pub failed: u64,
}

/// Outcome of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RefreshRunReport {
    pub listed: usize,
    pub refreshed: usize,
    pub failed: usize,
    /// Set when listing failed and nothing was refreshed.
    pub listing_error: Option<String>,
}

// ============================================================================
// JOB
// ============================================================================

pub struct MetricsRefreshJob {
    products: Arc<dyn ProductStore>,
    service: Arc<AcquisitionService>,
    config: RefreshJobConfig,
    metrics: RefreshMetrics,
    running: Mutex<()>,
}

impl std::fmt::Debug for MetricsRefreshJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRefreshJob")
            .field("config", &self.config)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}

impl MetricsRefreshJob {
    pub fn new(
        products: Arc<dyn ProductStore>,
        service: Arc<AcquisitionService>,
        config: RefreshJobConfig,
    ) -> Self {
        Self {
            products,
            service,
            config,
            metrics: RefreshMetrics::default(),
            running: Mutex::new(()),
        }
    }

    pub fn metrics(&self) -> &RefreshMetrics {
        &self.metrics
    }

    /// Run once unless a previous run is still in progress.
    pub async fn run_if_idle(&self) -> Option<RefreshRunReport> {
        let Ok(_guard) = self.running.try_lock() else {
            self.metrics.skipped_overlaps.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Previous metrics refresh still running, skipping trigger");
            return None;
        };
        Some(self.run_once().await)
    }

    /// Execute one refresh run.
    pub async fn run_once(&self) -> RefreshRunReport {
        tracing::info!(batch_size = self.config.batch_size, "Metrics refresh started");

        let asins = match self.products.identifiers_page(self.config.batch_size).await {
            Ok(asins) => asins,
            Err(e) => {
                self.metrics.run_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, "Metrics refresh failed to list products");
                return RefreshRunReport {
                    listing_error: Some(e.to_string()),
                    ..RefreshRunReport::default()
                };
            }
        };
        self.metrics.runs.fetch_add(1, Ordering::Relaxed);

        if asins.is_empty() {
            tracing::info!("No products to refresh");
            return RefreshRunReport::default();
        }

        let service = self.service.as_ref();
        let outcomes = run_chunked(&asins, self.config.concurrency, |asin| async move {
            match service.refresh(&asin).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(asin = %asin, error = %e, "Metrics refresh failed for product");
                    false
                }
            }
        })
        .await;

        let refreshed = outcomes.iter().filter(|ok| **ok).count();
        let report = RefreshRunReport {
            listed: asins.len(),
            refreshed,
            failed: asins.len() - refreshed,
            listing_error: None,
        };
        self.metrics
            .refreshed
            .fetch_add(report.refreshed as u64, Ordering::Relaxed);
        self.metrics
            .failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);

        tracing::info!(
            listed = report.listed,
            refreshed = report.refreshed,
            failed = report.failed,
            "Metrics refresh finished"
        );
        report
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Running cron schedule for a [`MetricsRefreshJob`].
pub struct MetricsRefreshScheduler {
    scheduler: JobScheduler,
    job_id: Uuid,
    cron: String,
}

impl std::fmt::Debug for MetricsRefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRefreshScheduler")
            .field("job_id", &self.job_id)
            .field("cron", &self.cron)
            .finish()
    }
}

impl MetricsRefreshScheduler {
    /// Schedule `job` on `cron` (5 or 6 fields) and start the scheduler.
    pub async fn start(job: Arc<MetricsRefreshJob>, cron: &str) -> Result<Self, SchedulerError> {
        let cron = normalize_cron(cron)?;

        let scheduler = JobScheduler::new()
            .await
            .map_err(SchedulerError::scheduler)?;

        let scheduled = Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let job = Arc::clone(&job);
            Box::pin(async move {
                job.run_if_idle().await;
            })
        })
        .map_err(|e| SchedulerError::InvalidCron {
            expr: cron.clone(),
            reason: format!("{:?}", e),
        })?;

        let job_id = scheduler
            .add(scheduled)
            .await
            .map_err(SchedulerError::scheduler)?;
        scheduler.start().await.map_err(SchedulerError::scheduler)?;

        tracing::info!(cron = %cron, job_id = %job_id, "Metrics refresh scheduled");
        Ok(Self {
            scheduler,
            job_id,
            cron,
        })
    }

    pub fn cron(&self) -> &str {
        &self.cron
    }

    /// Stop triggering runs. A run already in progress is not interrupted.
    pub async fn stop(mut self) -> Result<(), SchedulerError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(SchedulerError::scheduler)?;
        tracing::info!(job_id = %self.job_id, "Metrics refresh scheduler stopped");
        Ok(())
    }
}
