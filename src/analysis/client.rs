//! reqwest-backed [`AnalysisClient`] for the scoring endpoint.
//!
//! HTTP-level conditions are folded into an [`Outcome`]: 429 or a structured
//! rate-limit body becomes [`Outcome::RateLimited`], other failures become
//! [`Outcome::Error`], and success bodies go through
//! [`extract_payload`](super::extract::extract_payload).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::extract::extract_payload;
use super::{AnalysisClient, Outcome, Unit};
use crate::config::ClientConfig;

/// Request body sent to the scoring endpoint.
#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speaker: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
}

pub struct HttpAnalysisClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    prompt: Option<String>,
    response_field: String,
    default_retry_after: Duration,
    max_retry_after: Duration,
}

impl HttpAnalysisClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        anyhow::ensure!(
            !config.endpoint.is_empty(),
            "no scoring endpoint configured. Set [client] endpoint or LOTION_ENDPOINT."
        );

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            prompt: config.prompt.clone(),
            response_field: config.response_field.clone(),
            default_retry_after: config.default_retry_after(),
            max_retry_after: config.max_retry_after(),
        })
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(&self, unit: &Unit) -> Outcome {
        let body = ScoreRequest {
            id: &unit.id,
            text: &unit.text,
            speaker: unit.speaker.as_deref(),
            prompt: self.prompt.as_deref(),
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header(AUTHORIZATION, key);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(index = unit.index, "scoring request timed out");
                return Outcome::Error("timeout".into());
            }
            Err(e) => {
                warn!(index = unit.index, error = %e, "scoring request failed");
                return Outcome::Error(format!("request failed: {e}"));
            }
        };

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let text = match response.text().await {
            Ok(t) => t,
            Err(e) if e.is_timeout() => return Outcome::Error("timeout".into()),
            Err(e) => return Outcome::Error(format!("failed to read response: {e}")),
        };

        debug!(index = unit.index, status, body_len = text.len(), "scoring response");

        classify_response(
            status,
            retry_after.as_deref(),
            &text,
            &self.response_field,
            self.default_retry_after,
            self.max_retry_after,
        )
    }
}

/// Map a completed HTTP exchange into an [`Outcome`].
///
/// Rate limiting is recognized from a 429 status or from a JSON body with
/// `rate_limited: true` or an `error` mentioning a rate limit. The wait comes
/// from the `Retry-After` header, then a body `retry_after` number, then
/// `fallback`, and is capped at `max_wait`.
pub fn classify_response(
    status: u16,
    retry_after: Option<&str>,
    body: &str,
    response_field: &str,
    fallback: Duration,
    max_wait: Duration,
) -> Outcome {
    let json = serde_json::from_str::<Value>(body).ok();

    if status == 429 || json.as_ref().is_some_and(is_rate_limit_body) {
        let wait = retry_after
            .and_then(|v| parse_retry_after(v, Utc::now()))
            .or_else(|| json.as_ref().and_then(body_retry_after))
            .unwrap_or(fallback);
        if wait > max_wait {
            warn!(?wait, ?max_wait, "advised wait exceeds cap, clamping");
        }
        return Outcome::RateLimited(wait.min(max_wait));
    }

    if !(200..300).contains(&status) {
        return Outcome::Error(format!("HTTP {status}"));
    }

    match extract_payload(body, response_field) {
        Ok(payload) => Outcome::Ok(payload),
        Err(reason) => Outcome::Error(reason),
    }
}

fn is_rate_limit_body(body: &Value) -> bool {
    if body.get("rate_limited").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    body.get("error")
        .and_then(Value::as_str)
        .map(|e| {
            let e = e.to_ascii_lowercase();
            e.contains("rate limit") || e.contains("rate_limit")
        })
        .unwrap_or(false)
}

fn body_retry_after(body: &Value) -> Option<Duration> {
    body.get("retry_after")
        .and_then(Value::as_f64)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP-date.
///
/// Negative, non-finite or unrepresentable seconds yield `None`.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    // A date in the past means "now".
    Some(
        at.with_timezone(&Utc)
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}
