//! CLI `wait` command — block until a transcription job finishes.

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use lotion::config::LotionConfig;
use lotion::polling::PollPolicy;
use lotion::transcription::TranscriptionClient;

pub async fn wait(config: &LotionConfig, job_id: &str) -> Result<()> {
    let client = TranscriptionClient::new(&config.transcription)?;
    let policy = PollPolicy::from(&config.polling);

    let cancel = CancellationToken::new();
    let interrupt = super::cancel_on_ctrl_c(cancel.clone());
    let job = client.wait_for(job_id, &policy, &cancel).await;
    interrupt.abort();

    println!("{}", serde_json::to_string_pretty(&job?)?);
    Ok(())
}
