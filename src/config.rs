use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LotionConfig {
    pub logging: LoggingConfig,
    pub client: ClientConfig,
    pub pipeline: PipelineConfig,
    pub polling: PollingConfig,
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

/// Scoring endpoint settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Optional instruction forwarded with every unit.
    pub prompt: Option<String>,
    pub request_timeout_secs: u64,
    /// Wait used when a rate-limit response carries no hint.
    pub default_retry_after_secs: u64,
    /// Upper bound on any server-advised wait.
    pub max_retry_after_secs: u64,
    /// Envelope field holding the model's text when the endpoint wraps it.
    pub response_field: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub inter_batch_delay_ms: u64,
    pub intra_batch_delay_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub max_attempts: u32,
    pub max_duration_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            prompt: None,
            request_timeout_secs: 60,
            default_retry_after_secs: 30,
            max_retry_after_secs: 600,
            response_field: "response".into(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            inter_batch_delay_ms: 2000,
            intra_batch_delay_ms: 500,
            max_attempts: 3,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3,
            max_attempts: 200,
            max_duration_secs: Some(1800),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_secs)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }
}

/// Returns `~/.lotion/`
pub fn default_lotion_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".lotion"))
        .context("could not determine home directory")
}

/// Returns the default config file path: `~/.lotion/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    Ok(default_lotion_dir()?.join("config.toml"))
}

impl LotionConfig {
    /// Load config from the default TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path()?)
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            LotionConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (LOTION_ENDPOINT, LOTION_API_KEY, LOTION_LOG_LEVEL, LOTION_TRANSCRIPTION_ENDPOINT).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LOTION_ENDPOINT") {
            self.client.endpoint = val;
        }
        if let Ok(val) = std::env::var("LOTION_API_KEY") {
            self.client.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("LOTION_LOG_LEVEL") {
            self.logging.log_level = val;
        }
        if let Ok(val) = std::env::var("LOTION_TRANSCRIPTION_ENDPOINT") {
            self.transcription.endpoint = val;
        }
    }
}
