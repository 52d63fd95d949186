// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::batch::BatchConfig;
use crate::cache::CacheConfig;
use crate::error::{GemflowError, Result};
use crate::streaming::StreamingConfig;
use crate::utils::retry::RetryConfig;
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file at `~/.gemflow/config.toml`
    /// 3. Defaults (lowest)
    pub fn load() -> Result<Self> {
        Self::build(File::with_name(&Self::default_config_path()).required(false))
    }

    /// Same as [`AppConfig::load`] but reads the given file, which must exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(File::from(path.as_ref()).required(true))
    }

    fn build(file: File<config::FileSourceFile, config::FileFormat>) -> Result<Self> {
        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            .add_source(file)
            // Override with environment variables, e.g. GEMFLOW_RETRY__MAX_RETRIES
            // or GEMFLOW_GEMINI__API_KEYS=key1,key2
            .add_source(
                Environment::with_prefix("GEMFLOW")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("gemini.api_keys")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| GemflowError::Config(e.to_string()))?;

        let app: Self = config
            .try_deserialize()
            .map_err(|e| GemflowError::Config(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    /// Reject settings the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.gemini.api_keys.is_empty() {
            return Err(GemflowError::Config(
                "no API keys configured (gemini.api_keys or GEMFLOW_GEMINI__API_KEYS)".into(),
            ));
        }
        if self.gemini.api_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(GemflowError::Config("api_keys contains an empty key".into()));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(GemflowError::Config(format!(
                "retry.backoff_multiplier must be >= 1.0, got {}",
                self.retry.backoff_multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(GemflowError::Config(format!(
                "retry.jitter must be within [0, 1], got {}",
                self.retry.jitter
            )));
        }
        if self.batch.max_batch_size == 0 {
            return Err(GemflowError::Config("batch.max_batch_size must be positive".into()));
        }
        if self.batch.polling_interval_seconds == 0 {
            return Err(GemflowError::Config(
                "batch.polling_interval_seconds must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        let r = &self.retry;
        RetryConfig::new(
            r.max_retries,
            Duration::from_millis(r.base_delay_ms),
            r.backoff_multiplier,
        )
        .with_max_delay(Duration::from_millis(r.max_delay_ms))
        .with_jitter(r.jitter)
        .with_retryable_status_codes(r.retryable_status_codes.clone())
    }

    pub fn cache_config(&self) -> CacheConfig {
        match self.cache.mode {
            CacheMode::Disabled => CacheConfig::disabled(),
            CacheMode::Default => CacheConfig::default(),
            CacheMode::ShortLived => CacheConfig::short_lived(),
            CacheMode::LongLived => CacheConfig::long_lived(),
            CacheMode::Custom => CacheConfig {
                enabled: true,
                ttl: Duration::from_secs(self.cache.ttl_seconds),
                max_entries: self.cache.max_entries,
            },
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_batch_size: self.batch.max_batch_size,
            batch_timeout: Duration::from_secs(self.batch.batch_timeout_seconds),
            polling_interval: Duration::from_secs(self.batch.polling_interval_seconds),
        }
    }

    pub fn streaming_config(&self) -> StreamingConfig {
        StreamingConfig::new(
            self.streaming.buffer_size,
            Duration::from_secs(self.streaming.chunk_timeout_seconds),
        )
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gemflow")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}
