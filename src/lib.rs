//! Throttled batch analysis of conversation transcripts.
//!
//! `lotion` takes a transcript split into sentences, sends each sentence to an
//! external scoring endpoint (typically an LLM gateway), and collects the
//! structured insight returned for every sentence. The endpoint enforces a
//! global rate limit, so units are analyzed strictly one at a time:
//!
//! | Stage | Behavior |
//! |-------|----------|
//! | **Batching** | Contiguous batches of `batch_size`, delay between batches |
//! | **Throttling** | Delay between units inside a batch |
//! | **Retry** | Only on rate limiting, bounded by `max_attempts` |
//! | **Results** | Index-addressed store, snapshot published per resolved unit |
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`analysis`] — Units, the scoring client trait, and its HTTP implementation
//! - [`pipeline`] — Batch plan, scheduler, retry controller, and result store
//! - [`polling`] — Bounded polling policy for long-running jobs
//! - [`transcript`] — Sentence splitting and unit construction
//! - [`transcription`] — Waiting on transcription jobs

pub mod analysis;
pub mod config;
pub mod pipeline;
pub mod polling;
pub mod transcript;
pub mod transcription;
