//! CLI `doctor` command — check the resolved configuration and print a report.

use anyhow::Result;

use lotion::config::LotionConfig;
use lotion::pipeline::PipelineOptions;
use lotion::polling::PollPolicy;

pub fn doctor(config: &LotionConfig) -> Result<()> {
    let options = PipelineOptions::from(&config.pipeline);
    let policy = PollPolicy::from(&config.polling);

    println!("Lotion Health Report");
    println!("====================");
    println!();
    println!("Scoring endpoint:");
    println!("  URL:             {}", or_unset(&config.client.endpoint));
    println!("  API key:         {}", if config.client.api_key.is_some() { "set" } else { "(not set)" });
    println!("  Timeout:         {}s", config.client.request_timeout_secs);
    println!("  Default backoff: {}s", config.client.default_retry_after_secs);
    println!("  Max backoff:     {}s", config.client.max_retry_after_secs);
    println!();
    println!("Pipeline:");
    println!("  Batch size:      {}", options.batch_size);
    println!("  Between units:   {:?}", options.intra_batch_delay);
    println!("  Between batches: {:?}", options.inter_batch_delay);
    println!("  Max attempts:    {}", options.max_attempts);
    match options.validate() {
        Ok(()) => println!("  Status:          OK"),
        Err(e) => println!("  Status:          INVALID ({e})"),
    }
    println!();
    println!("Transcription:");
    println!("  URL:             {}", or_unset(&config.transcription.endpoint));
    println!("  Poll interval:   {:?}", policy.interval);
    println!("  Max polls:       {}", policy.max_attempts);
    if let Some(max) = policy.max_duration {
        println!("  Max wait:        {max:?}");
    }

    if config.client.endpoint.is_empty() {
        println!();
        println!("Set [client] endpoint in ~/.lotion/config.toml or export LOTION_ENDPOINT.");
    }

    Ok(())
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}
