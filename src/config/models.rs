//! Configuration data structures for gemflow.
//!
//! This module defines the schema for the application settings: API keys,
//! retry policy, response caching, batch pacing, streaming limits and
//! logging.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Upstream Gemini API settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Retry policy for unary calls.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Batch job limits and polling.
    #[serde(default)]
    pub batch: BatchSettings,

    /// Streaming buffer and timeout settings.
    #[serde(default)]
    pub streaming: StreamingSettings,

    /// Local in-flight request limit.
    #[serde(default)]
    pub concurrency: ConcurrencySettings,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the upstream Gemini API connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL for the Generative Language API.
    /// Default: `https://generativelanguage.googleapis.com/v1beta`
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// API keys rotated round-robin across requests. At least one is required.
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Model used when a request does not name one.
    /// Default: `gemini-2.5-flash`
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Whole-request timeout for unary and batch calls, in seconds.
    /// Default: `300` (5 minutes)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// TCP connect timeout in seconds.
    /// Default: `10`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

/// Retry policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt. Default: `3`
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait before the first retry, in milliseconds. Default: `500`
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Growth factor between retries; must be >= 1.0. Default: `2.0`
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Cap on any single wait, in milliseconds. Default: `30000`
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Randomization factor in `[0.0, 1.0]`. Default: `0.0`
    #[serde(default)]
    pub jitter: f64,

    /// HTTP statuses worth retrying. Default: `[429, 500, 502, 503, 504]`
    #[serde(default = "default_retryable_status_codes")]
    pub retryable_status_codes: Vec<u16>,
}

/// Named cache presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    Disabled,
    /// 300s TTL, 100 entries.
    #[default]
    Default,
    /// 60s TTL, 50 entries.
    ShortLived,
    /// 3600s TTL, 1000 entries.
    LongLived,
    /// Uses `ttl_seconds` and `max_entries`.
    Custom,
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub mode: CacheMode,

    /// Entry lifetime for `custom` mode. Default: `300`
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,

    /// Capacity for `custom` mode. Default: `100`
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

/// Batch job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Default: `100`
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Give up waiting for a job after this many seconds. Default: `3600`
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_seconds: u64,

    /// Seconds between status checks. Default: `10`
    #[serde(default = "default_polling_interval")]
    pub polling_interval_seconds: u64,
}

/// Streaming settings. Values below the minimum are raised to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingSettings {
    /// Decoder buffer in bytes, at least 1024. Default: `8192`
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Max wait for the next piece of data, at least 5. Default: `30`
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencySettings {
    /// Requests allowed in flight at once.
    /// Default: Number of logical CPU cores.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default trait implementations linking to custom logic

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_keys: Vec::new(),
            default_model: default_model(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter: 0.0,
            retryable_status_codes: default_retryable_status_codes(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            mode: CacheMode::Default,
            ttl_seconds: default_cache_ttl(),
            max_entries: default_cache_entries(),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            batch_timeout_seconds: default_batch_timeout(),
            polling_interval_seconds: default_polling_interval(),
        }
    }
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            chunk_timeout_seconds: default_chunk_timeout(),
        }
    }
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Helper functions for serde defaults
fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_retryable_status_codes() -> Vec<u16> {
    crate::utils::retry::DEFAULT_RETRYABLE_STATUS_CODES.to_vec()
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_entries() -> usize {
    100
}

fn default_max_batch_size() -> usize {
    100
}

fn default_batch_timeout() -> u64 {
    3600
}

fn default_polling_interval() -> u64 {
    10
}

fn default_buffer_size() -> usize {
    8192
}

fn default_chunk_timeout() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    num_cpus::get()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
