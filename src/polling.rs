//! Bounded polling for long-running external jobs.
//!
//! [`poll_until`] repeatedly probes a job until a terminal-status predicate
//! holds. Every poll is bounded by attempt count and, optionally, total
//! duration. Timing goes through `tokio::time`, so tests drive it with a
//! paused clock instead of real timers.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PollingConfig;
use crate::pipeline::sleep_until;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between consecutive probes.
    pub interval: Duration,
    /// Maximum number of probes, at least one is always made.
    pub max_attempts: u32,
    /// Give up once waiting again would exceed this much elapsed time.
    pub max_duration: Option<Duration>,
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            max_attempts: config.max_attempts,
            max_duration: config.max_duration_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PollError {
    #[error("job still not finished after {attempts} polls")]
    Exhausted { attempts: u32 },
    #[error("job still not finished after {0:?}")]
    TimedOut(Duration),
    #[error("polling cancelled")]
    Cancelled,
    #[error("poll failed: {0}")]
    Probe(String),
}

/// Probe until `is_terminal` accepts the probed value.
///
/// A probe error ends polling immediately with [`PollError::Probe`].
pub async fn poll_until<T, F, Fut, P>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut probe: F,
    is_terminal: P,
) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    P: Fn(&T) -> bool,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }

        attempts += 1;
        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            value = probe() => value.map_err(|e| PollError::Probe(format!("{e:#}")))?,
        };

        if is_terminal(&value) {
            debug!(attempts, "poll reached terminal status");
            return Ok(value);
        }
        if attempts >= policy.max_attempts {
            return Err(PollError::Exhausted { attempts });
        }

        let next = Instant::now() + policy.interval;
        if let Some(max) = policy.max_duration {
            if next.duration_since(started) > max {
                return Err(PollError::TimedOut(max));
            }
        }

        debug!(attempts, interval_ms = policy.interval.as_millis() as u64, "job not finished, polling again");
        if !sleep_until(cancel, next).await {
            return Err(PollError::Cancelled);
        }
    }
}
