#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lotion::analysis::{AnalysisClient, Outcome, Unit};
use lotion::pipeline::PipelineOptions;
use serde_json::json;

/// Fake scoring client with per-index scripted outcomes.
///
/// Unscripted indices succeed with `{"index": i}`. A script's last outcome
/// repeats once the earlier ones are used up.
pub struct ScriptedClient {
    scripts: Mutex<HashMap<usize, VecDeque<Outcome>>>,
    calls: Mutex<Vec<usize>>,
    latency: Duration,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    pub fn script(self, index: usize, outcomes: Vec<Outcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(index, outcomes.into_iter().collect());
        self
    }

    /// Every call takes this long (on the tokio clock) before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Indices in the order they were sent to the client.
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, index: usize) -> usize {
        self.calls.lock().unwrap().iter().filter(|&&i| i == index).count()
    }

    fn next_outcome(&self, index: usize) -> Outcome {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&index) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Outcome::Ok(json!({ "index": index })),
        }
    }
}

#[async_trait]
impl AnalysisClient for ScriptedClient {
    async fn analyze(&self, unit: &Unit) -> Outcome {
        self.calls.lock().unwrap().push(unit.index);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.next_outcome(unit.index)
    }
}

/// `count` units with dense indices.
pub fn units(count: usize) -> Vec<Unit> {
    (0..count)
        .map(|i| Unit::new(i, format!("unit-{i}"), format!("Sentence number {i}.")))
        .collect()
}

pub fn options(batch_size: usize) -> PipelineOptions {
    PipelineOptions {
        batch_size,
        inter_batch_delay: Duration::from_secs(1),
        intra_batch_delay: Duration::from_millis(100),
        max_attempts: 3,
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
