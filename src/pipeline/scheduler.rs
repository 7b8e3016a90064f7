//! Sequential batch scheduler.
//!
//! Units are processed one at a time, batch by batch, in their original
//! order. The scheduler holds no result state: every terminal result is handed
//! to the caller's `on_unit_resolved` callback the moment it is known.

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::plan::BatchPlan;
use super::retry::RetryController;
use super::{
    sleep_until, AnalysisResult, PipelineError, PipelineOptions, RunReport, RunStatus, ABORTED,
    CANCELLED,
};
use crate::analysis::{AnalysisClient, Unit};

pub struct BatchScheduler {
    options: PipelineOptions,
    cancel: CancellationToken,
}

impl BatchScheduler {
    /// Create a scheduler, rejecting invalid options up front.
    pub fn new(options: PipelineOptions, cancel: CancellationToken) -> Result<Self, PipelineError> {
        options.validate()?;
        Ok(Self { options, cancel })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Resolve every unit and report how the run ended.
    ///
    /// `units[i].index` must equal `i`. Returns `Err` only for configuration
    /// problems, before any call to `client`. Units left unresolved by
    /// cancellation or an abort are still passed to `on_unit_resolved`, as
    /// `Failed("cancelled")` or `Failed("pipeline aborted")`.
    pub async fn run<C, F>(
        &self,
        client: &C,
        units: &[Unit],
        mut on_unit_resolved: F,
    ) -> Result<RunReport, PipelineError>
    where
        C: AnalysisClient + ?Sized,
        F: FnMut(usize, AnalysisResult) -> Result<(), PipelineError>,
    {
        self.options.validate()?;
        if let Some((position, unit)) = units.iter().enumerate().find(|(i, u)| u.index != *i) {
            return Err(PipelineError::Configuration(format!(
                "unit at position {position} has index {}",
                unit.index
            )));
        }
        let plan = BatchPlan::new(units.len(), self.options.batch_size)?;

        let started_at = Utc::now();
        let retry = RetryController::new(client, self.options.max_attempts, self.cancel.clone());
        let mut succeeded = 0;
        let mut failed = 0;
        // Every index below this has been handed to the callback.
        let mut emitted = 0;

        let status = 'run: {
            if let Err(e) = plan.verify() {
                break 'run RunStatus::Aborted(e.to_string());
            }

            let batch_count = plan.batch_count();
            for (b, batch) in plan.batches().iter().enumerate() {
                info!(batch = b + 1, of = batch_count, units = batch.len(), "starting batch");

                for index in batch.clone() {
                    if self.cancel.is_cancelled() {
                        break 'run RunStatus::Cancelled;
                    }

                    let result = retry.resolve(&units[index]).await;
                    match result {
                        AnalysisResult::Succeeded(_) => succeeded += 1,
                        _ => failed += 1,
                    }
                    emitted = index + 1;
                    if let Err(e) = on_unit_resolved(index, result) {
                        error!(index, error = %e, "result store rejected update, aborting run");
                        break 'run RunStatus::Aborted(e.to_string());
                    }

                    if index + 1 < batch.end
                        && !self.pause(self.options.intra_batch_delay).await
                    {
                        break 'run RunStatus::Cancelled;
                    }
                }

                if b + 1 < batch_count && !self.pause(self.options.inter_batch_delay).await {
                    break 'run RunStatus::Cancelled;
                }
            }

            if self.cancel.is_cancelled() {
                RunStatus::Cancelled
            } else {
                RunStatus::Completed
            }
        };

        let leftover_reason = match status {
            RunStatus::Completed => None,
            RunStatus::Cancelled => Some(CANCELLED),
            RunStatus::Aborted(_) => Some(ABORTED),
        };
        if let Some(reason) = leftover_reason {
            for index in emitted..units.len() {
                if let Err(e) = on_unit_resolved(index, AnalysisResult::failed(reason)) {
                    error!(index, error = %e, "result store rejected leftover result");
                }
                failed += 1;
            }
        }

        let report = RunReport {
            status,
            total: units.len(),
            succeeded,
            failed,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            status = ?report.status,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "pipeline run finished"
        );
        Ok(report)
    }

    async fn pause(&self, delay: std::time::Duration) -> bool {
        sleep_until(&self.cancel, Instant::now() + delay).await
    }
}
