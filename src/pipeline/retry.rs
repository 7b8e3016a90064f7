//! Rate-limit-aware retry around a single unit.
//!
//! Only [`Outcome::RateLimited`] is retried. A generic [`Outcome::Error`] is
//! treated as non-transient for the rest of the run and becomes terminal at
//! once.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{sleep_until, AnalysisResult, CANCELLED, RETRIES_EXHAUSTED};
use crate::analysis::{AnalysisClient, Outcome, Unit};

/// Transient per-unit retry bookkeeping, dropped once the unit resolves.
#[derive(Debug, Default)]
struct RetryState {
    attempts: u32,
    next_eligible: Option<Instant>,
}

pub struct RetryController<'a, C: ?Sized> {
    client: &'a C,
    max_attempts: u32,
    cancel: CancellationToken,
}

impl<'a, C> RetryController<'a, C>
where
    C: AnalysisClient + ?Sized,
{
    /// A `max_attempts` of 0 is treated as 1: every unit gets at least one
    /// call. [`PipelineOptions::validate`](super::PipelineOptions::validate)
    /// rejects 0 before a scheduler ever builds a controller.
    pub fn new(client: &'a C, max_attempts: u32, cancel: CancellationToken) -> Self {
        Self {
            client,
            max_attempts: max_attempts.max(1),
            cancel,
        }
    }

    /// Drive `unit` to a terminal result.
    ///
    /// The client is invoked at most `max_attempts` times. Cancellation is
    /// honored before each call, during the call, and during backoff.
    pub async fn resolve(&self, unit: &Unit) -> AnalysisResult {
        let mut state = RetryState::default();

        loop {
            if let Some(deadline) = state.next_eligible.take() {
                if !sleep_until(&self.cancel, deadline).await {
                    return AnalysisResult::failed(CANCELLED);
                }
            }
            if self.cancel.is_cancelled() {
                return AnalysisResult::failed(CANCELLED);
            }

            state.attempts += 1;
            debug!(index = unit.index, attempt = state.attempts, "analyzing unit");

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return AnalysisResult::failed(CANCELLED),
                outcome = self.client.analyze(unit) => outcome,
            };

            match outcome {
                Outcome::Ok(payload) => return AnalysisResult::Succeeded(payload),
                Outcome::Error(message) => {
                    warn!(index = unit.index, error = %message, "unit failed");
                    return AnalysisResult::Failed(message);
                }
                Outcome::RateLimited(wait) => {
                    if state.attempts >= self.max_attempts {
                        warn!(
                            index = unit.index,
                            attempts = state.attempts,
                            "rate limited on every attempt, giving up"
                        );
                        return AnalysisResult::failed(RETRIES_EXHAUSTED);
                    }
                    warn!(
                        index = unit.index,
                        attempt = state.attempts,
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    match Instant::now().checked_add(wait) {
                        Some(deadline) => state.next_eligible = Some(deadline),
                        None => {
                            warn!(index = unit.index, ?wait, "retry wait out of range, giving up");
                            return AnalysisResult::failed(RETRIES_EXHAUSTED);
                        }
                    }
                }
            }
        }
    }
}
