//! Throttled batch analysis pipeline.
//!
//! A run takes an ordered sequence of [`Unit`]s and an [`AnalysisClient`] and
//! resolves every unit to a terminal [`AnalysisResult`]:
//!
//! - [`plan::BatchPlan`] partitions the sequence into contiguous batches
//! - [`scheduler::BatchScheduler`] walks batches and units strictly in order,
//!   applying intra- and inter-batch delays
//! - [`retry::RetryController`] retries a unit only while it is rate limited
//! - [`store::ResultStore`] holds the index-addressed results and publishes
//!   snapshots to subscribers
//!
//! Per-unit failures are data ([`AnalysisResult::Failed`]); only configuration
//! errors are returned as `Err`.

pub mod plan;
pub mod retry;
pub mod scheduler;
pub mod store;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::analysis::{AnalysisClient, Unit};
use crate::config::PipelineConfig;
use scheduler::BatchScheduler;
use store::{ResultStore, Snapshot};

/// Failure reason recorded for units left unresolved by cancellation.
pub const CANCELLED: &str = "cancelled";
/// Failure reason recorded for units left unresolved by an aborted run.
pub const ABORTED: &str = "pipeline aborted";
/// Failure reason when a unit stays rate limited for every attempt.
pub const RETRIES_EXHAUSTED: &str = "rate limited, retries exhausted";

/// Per-unit result, addressed by unit index.
///
/// Transitions only `Pending -> Succeeded` or `Pending -> Failed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum AnalysisResult {
    Pending,
    Succeeded(serde_json::Value),
    Failed(String),
}

impl AnalysisResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PipelineError {
    /// Invalid options or input; raised before any network activity.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Result store corruption, e.g. a second write to a terminal index.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Tuning for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
    pub intra_batch_delay: Duration,
    pub max_attempts: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            inter_batch_delay: Duration::from_millis(config.inter_batch_delay_ms),
            intra_batch_delay: Duration::from_millis(config.intra_batch_delay_ms),
            max_attempts: config.max_attempts,
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.batch_size == 0 {
            return Err(PipelineError::Configuration(
                "batch size must be at least 1".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(PipelineError::Configuration(
                "max attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
    Aborted(String),
}

/// Pipeline-level completion report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Final state of a run: the report plus every unit's terminal result in index order.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub report: RunReport,
    pub results: Vec<AnalysisResult>,
}

/// Sleep until `deadline` unless `cancel` fires first. Returns `false` on cancellation.
pub(crate) async fn sleep_until(cancel: &CancellationToken, deadline: tokio::time::Instant) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep_until(deadline) => true,
    }
}

/// Run the full pipeline over `units`.
///
/// A fresh [`ResultStore`] is created for the run and `subscriber` receives a
/// snapshot after every resolved unit. Returns `Err` only for invalid options
/// or input; cancellation and aborts are reported in [`RunReport::status`].
pub async fn run_pipeline<C, F>(
    client: &C,
    units: &[Unit],
    options: &PipelineOptions,
    cancel: CancellationToken,
    subscriber: F,
) -> Result<PipelineRun, PipelineError>
where
    C: AnalysisClient + ?Sized,
    F: FnMut(&Snapshot) + Send + 'static,
{
    let scheduler = BatchScheduler::new(options.clone(), cancel)?;

    let mut store = ResultStore::new();
    store.initialize(units.len());
    store.subscribe(subscriber);

    let mut report = scheduler
        .run(client, units, |index, result| store.set(index, result))
        .await?;

    // Completeness holds even if the scheduler bailed out mid-batch.
    let leftover = store.fail_pending(ABORTED);
    if leftover > 0 && report.status == RunStatus::Completed {
        tracing::error!(leftover, "units left pending after run");
        report.status = RunStatus::Aborted(format!("{leftover} units left pending"));
    }

    let results = store.snapshot().into_vec();
    report.succeeded = results
        .iter()
        .filter(|r| matches!(r, AnalysisResult::Succeeded(_)))
        .count();
    report.failed = results
        .iter()
        .filter(|r| matches!(r, AnalysisResult::Failed(_)))
        .count();

    Ok(PipelineRun { report, results })
}
