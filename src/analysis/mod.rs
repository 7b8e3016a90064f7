//! Per-unit analysis against an external scoring endpoint.
//!
//! Defines the [`Unit`] being analyzed, the [`Outcome`] of a single attempt, and
//! the [`AnalysisClient`] trait the pipeline drives. [`client::HttpAnalysisClient`]
//! is the reqwest-backed implementation; [`extract`] holds the pure
//! JSON-in-text parsing it relies on.

pub mod client;
pub mod extract;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One analyzable item with a stable position in the original sequence.
///
/// Constructed once before a run starts and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Position in the ordered unit sequence.
    pub index: usize,
    /// Correlation identifier sent with the request.
    pub id: String,
    /// The sentence text.
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

impl Unit {
    pub fn new(index: usize, id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            index,
            id: id.into(),
            text: text.into(),
            speaker: None,
        }
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }
}

/// Result of one call to the scoring endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Parsed structured payload. May be an empty object.
    Ok(serde_json::Value),
    /// The endpoint asked us to slow down; wait this long before retrying.
    RateLimited(Duration),
    /// Hard failure for this attempt.
    Error(String),
}

/// Invokes the external scoring endpoint for a single unit.
///
/// Implementations map transport and HTTP conditions into an [`Outcome`]
/// and must not mutate shared state.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, unit: &Unit) -> Outcome;
}
