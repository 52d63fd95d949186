// Configuration loading tests
// Author: kelexine (https://github.com/kelexine)

use gemflow::config::{AppConfig, CacheMode};
use gemflow::RequestDispatcher;
use std::io::Write;
use std::time::Duration;

fn write_config(value: &toml::Value) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(file, "{}", toml::to_string(value).unwrap()).unwrap();
    file
}

#[test]
fn test_load_from_file_overrides_defaults() {
    let file = write_config(&toml::toml! {
        [gemini]
        api_keys = ["AIzaFirstKey", "AIzaSecondKey"]
        default_model = "gemini-2.5-pro"

        [retry]
        max_retries = 5
        base_delay_ms = 250
        retryable_status_codes = [429, 503]

        [cache]
        mode = "long_lived"

        [batch]
        max_batch_size = 20
    }
    .into());

    let config = AppConfig::load_from(file.path()).unwrap();

    assert_eq!(config.gemini.api_keys.len(), 2);
    assert_eq!(config.gemini.default_model, "gemini-2.5-pro");
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.retryable_status_codes, vec![429, 503]);
    assert_eq!(config.cache.mode, CacheMode::LongLived);
    assert_eq!(config.batch.max_batch_size, 20);
    // Untouched sections keep their defaults.
    assert_eq!(config.streaming.buffer_size, 8192);
    assert_eq!(config.retry.backoff_multiplier, 2.0);

    let retry = config.retry_config();
    assert_eq!(retry.max_retries, 5);
    assert_eq!(retry.base_delay, Duration::from_millis(250));
    assert_eq!(config.cache_config().ttl, Duration::from_secs(3600));
    assert_eq!(config.batch_config().max_batch_size, 20);
}

#[test]
fn test_load_from_rejects_invalid_values() {
    let file = write_config(&toml::toml! {
        [gemini]
        api_keys = ["AIzaKey"]

        [retry]
        backoff_multiplier = 0.5
    }
    .into());

    assert!(AppConfig::load_from(file.path()).is_err());
}

#[test]
fn test_load_from_requires_keys() {
    let file = write_config(&toml::toml! {
        [cache]
        mode = "disabled"
    }
    .into());

    assert!(AppConfig::load_from(file.path()).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(AppConfig::load_from(dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_dispatcher_from_config() {
    let file = write_config(&toml::toml! {
        [gemini]
        api_keys = ["AIzaFirstKey", "AIzaSecondKey", "AIzaThirdKey"]
        default_model = "gemini-2.5-flash-lite"

        [concurrency]
        max_concurrent = 3
    }
    .into());

    let config = AppConfig::load_from(file.path()).unwrap();
    let dispatcher = RequestDispatcher::from_config(&config).unwrap();

    assert_eq!(dispatcher.credentials().len(), 3);
    assert_eq!(dispatcher.limiter().limit(), 3);
    assert_eq!(dispatcher.default_model(), "gemini-2.5-flash-lite");
    assert!(dispatcher.cache().is_enabled());
}
