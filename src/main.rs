mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lotion::config::LotionConfig;

#[derive(Parser)]
#[command(name = "lotion", version, about = "Throttled batch analysis of conversation transcripts")]
struct Cli {
    /// Config file (defaults to ~/.lotion/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze every sentence of a transcript (.json sentence export or plain text)
    Analyze {
        input: PathBuf,
        /// Override the configured batch size
        #[arg(long)]
        batch_size: Option<usize>,
        /// Write results here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Wait for a transcription job to finish and print it
    Wait { job_id: String },
    /// Check configuration
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LotionConfig::load_from(path)?,
        None => LotionConfig::load()?,
    };

    // Log to stderr so stdout stays clean for JSON output.
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Analyze {
            input,
            batch_size,
            output,
        } => {
            cli::analyze::analyze(&config, &input, batch_size, output.as_deref()).await?;
        }
        Command::Wait { job_id } => {
            cli::wait::wait(&config, &job_id).await?;
        }
        Command::Doctor => {
            cli::doctor::doctor(&config)?;
        }
    }

    Ok(())
}
