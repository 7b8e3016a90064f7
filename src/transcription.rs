//! Waiting on transcription jobs.
//!
//! The transcription service is treated as opaque apart from the job status
//! document at `GET {endpoint}/{job_id}`, whose `status` field ends as either
//! `completed` or `error`.

use anyhow::{Context, Result};
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::TranscriptionConfig;
use crate::polling::{poll_until, PollPolicy};

pub struct TranscriptionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

/// Status of a job document, or `None` if it has no `status` string.
pub fn job_status(job: &Value) -> Option<&str> {
    job.get("status").and_then(Value::as_str)
}

/// Whether a job document has reached a final status.
pub fn is_finished(job: &Value) -> bool {
    matches!(job_status(job), Some("completed" | "error"))
}

impl TranscriptionClient {
    pub fn new(config: &TranscriptionConfig) -> Result<Self> {
        anyhow::ensure!(
            !config.endpoint.is_empty(),
            "no transcription endpoint configured. Set [transcription] endpoint or LOTION_TRANSCRIPTION_ENDPOINT."
        );
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Fetch the current job status document.
    pub async fn fetch(&self, job_id: &str) -> Result<Value> {
        let url = format!("{}/{job_id}", self.endpoint);
        let mut request = self.http.get(&url);
        if let Some(ref key) = self.api_key {
            request = request.header(AUTHORIZATION, key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("HTTP request failed for {url}"))?;
        anyhow::ensure!(
            response.status().is_success(),
            "job lookup failed with HTTP {}",
            response.status()
        );
        response
            .json::<Value>()
            .await
            .context("job status was not valid JSON")
    }

    /// Poll until the job completes. A job that ends in `error` is returned as `Err`.
    pub async fn wait_for(
        &self,
        job_id: &str,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        info!(job_id, "waiting for transcription job");
        let job = poll_until(policy, cancel, || self.fetch(job_id), is_finished)
            .await
            .with_context(|| format!("transcription job {job_id} did not finish"))?;

        if job_status(&job) == Some("error") {
            let reason = job
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("no error message");
            anyhow::bail!("transcription job {job_id} failed: {reason}");
        }

        info!(job_id, "transcription job completed");
        Ok(job)
    }
}
