//! CLI `analyze` command — run the batch pipeline over a transcript.

use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use lotion::analysis::client::HttpAnalysisClient;
use lotion::analysis::Unit;
use lotion::config::LotionConfig;
use lotion::pipeline::{run_pipeline, AnalysisResult, PipelineOptions, RunReport, RunStatus};
use lotion::transcript;

#[derive(Serialize)]
struct UnitOutput<'a> {
    #[serde(flatten)]
    unit: &'a Unit,
    result: &'a AnalysisResult,
}

#[derive(Serialize)]
struct AnalysisOutput<'a> {
    report: &'a RunReport,
    units: Vec<UnitOutput<'a>>,
}

/// Analyze every sentence of `input` and write the ordered results as JSON.
pub async fn analyze(
    config: &LotionConfig,
    input: &Path,
    batch_size: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let units = transcript::load_units(input)?;
    if units.is_empty() {
        eprintln!("No sentences found in {}.", input.display());
        return Ok(());
    }

    let mut options = PipelineOptions::from(&config.pipeline);
    if let Some(size) = batch_size {
        options.batch_size = size;
    }
    options.validate()?;

    let client = HttpAnalysisClient::new(&config.client)?;

    eprintln!(
        "Analyzing {} sentences in batches of {}...",
        units.len(),
        options.batch_size
    );

    let pb = ProgressBar::new(units.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("##-"),
    );

    let cancel = CancellationToken::new();
    let interrupt = super::cancel_on_ctrl_c(cancel.clone());

    let progress = pb.clone();
    let run = run_pipeline(&client, &units, &options, cancel, move |snapshot| {
        progress.set_position(snapshot.resolved() as u64);
    })
    .await;
    interrupt.abort();
    pb.finish_and_clear();
    let run = run?;

    let document = AnalysisOutput {
        report: &run.report,
        units: units
            .iter()
            .zip(run.results.iter())
            .map(|(unit, result)| UnitOutput { unit, result })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&document)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Results written to {}", path.display());
        }
        None => println!("{json}"),
    }

    let report = &run.report;
    match &report.status {
        RunStatus::Completed => eprintln!(
            "Done: {} succeeded, {} failed of {}.",
            report.succeeded, report.failed, report.total
        ),
        RunStatus::Cancelled => eprintln!(
            "Cancelled: {} succeeded before interruption, {} marked failed.",
            report.succeeded, report.failed
        ),
        RunStatus::Aborted(reason) => eprintln!("Aborted: {reason}"),
    }

    Ok(())
}
