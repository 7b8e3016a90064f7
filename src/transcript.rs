//! Turning transcripts into analyzable units.
//!
//! Input is either a sentence export from the transcription service
//! (`{"sentences": [{"text", "speaker", "start", "end"}]}`) or plain text,
//! which is split into sentences here.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::Unit;

/// One transcribed sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    #[serde(default)]
    pub speaker: Option<String>,
    /// Start offset in milliseconds.
    #[serde(default)]
    pub start: Option<u64>,
    /// End offset in milliseconds.
    #[serde(default)]
    pub end: Option<u64>,
}

impl Sentence {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            speaker: None,
            start: None,
            end: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentenceDocument {
    pub sentences: Vec<Sentence>,
}

/// Split plain text on `.`, `!` or `?` followed by whitespace or end of input.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}

/// Build units from sentences, skipping blank ones.
///
/// Indices are assigned after skipping, so they are dense and match positions.
/// Each unit gets a fresh UUID v7 correlation id.
pub fn units_from_sentences(sentences: &[Sentence]) -> Vec<Unit> {
    sentences
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .enumerate()
        .map(|(index, s)| Unit {
            index,
            id: Uuid::now_v7().to_string(),
            text: s.text.trim().to_string(),
            speaker: s.speaker.clone(),
        })
        .collect()
}

/// Load units from a `.json` sentence export or a plain-text transcript.
pub fn load_units(path: &Path) -> Result<Vec<Unit>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read transcript {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let sentences = if is_json {
        let doc: SentenceDocument =
            serde_json::from_str(&contents).context("failed to parse sentence export JSON")?;
        doc.sentences
    } else {
        split_sentences(&contents)
            .into_iter()
            .map(Sentence::plain)
            .collect()
    };

    Ok(units_from_sentences(&sentences))
}
