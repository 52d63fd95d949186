//! Structured logging and credential-safe trace utilities.
//!
//! This module configures the `tracing` ecosystem for the application,
//! supporting multiple output formats and providing utilities to prevent
//! API keys from leaking into logs.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::LoggingConfig;
use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Google API keys: `AIza` followed by 35 URL-safe characters.
static API_KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"AIza[0-9A-Za-z_\-]{35}").unwrap()
});

/// `key=...` query parameters in logged URLs.
static KEY_PARAM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([?&]key=)[^&\s]+").unwrap()
});

/// Initializes the global tracing subscriber for the application.
///
/// Supports two output formats:
/// - `json`: Structured JSON logs for production ingestion.
/// - `pretty` (default): Human-readable, colorized output for development.
///
/// Log levels are controlled via the `RUST_LOG` environment variable or
/// the provided `LoggingConfig`. Calling this twice is harmless.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}

/// Replaces API keys found in `input` with a `[REDACTED]` placeholder.
///
/// Catches bare `AIza...` keys anywhere in the text as well as the value
/// of any `key=` query parameter, so upstream error bodies and URLs can be
/// logged safely.
pub fn sanitize(input: &str) -> String {
    let result = API_KEY_PATTERN.replace_all(input, "[REDACTED_API_KEY]");
    KEY_PARAM_PATTERN
        .replace_all(&result, "${1}[REDACTED]")
        .into_owned()
}
