// Retry logic with Google retryDelay hint support
// Author: kelexine (https://github.com/kelexine)

use crate::error::{GemflowError, Result};
use backoff::{backoff::Backoff, ExponentialBackoff};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Status codes retried when no explicit list is configured.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Upper bound applied to server-provided retry hints.
const MAX_HINTED_DELAY: Duration = Duration::from_secs(60);

/// Decides whether a failed attempt may be retried.
pub type RetryPredicate = Arc<dyn Fn(&GemflowError) -> bool + Send + Sync>;

/// Retry behaviour for one logical request.
#[derive(Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt; `0` disables retrying.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub base_delay: Duration,
    /// Growth factor applied to the wait after each retry (>= 1.0).
    pub backoff_multiplier: f64,
    /// Cap on any single wait, including server hints.
    pub max_delay: Duration,
    /// Randomization factor in `[0.0, 1.0]`; `0.0` gives exact backoff.
    pub jitter: f64,
    pub retryable: RetryPredicate,
}

impl RetryConfig {
    pub fn new(max_retries: u32, base_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff_multiplier: backoff_multiplier.max(1.0),
            ..Self::default()
        }
    }

    /// A config that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Retry only transport failures and the given HTTP status codes.
    pub fn with_retryable_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retryable = status_code_predicate(codes);
        self
    }

    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&GemflowError) -> bool + Send + Sync + 'static,
    {
        self.retryable = Arc::new(predicate);
        self
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: self.jitter,
            multiplier: self.backoff_multiplier,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.0,
            retryable: status_code_predicate(DEFAULT_RETRYABLE_STATUS_CODES.to_vec()),
        }
    }
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

/// Predicate retrying connection-level failures plus the listed status codes.
pub fn status_code_predicate(codes: Vec<u16>) -> RetryPredicate {
    Arc::new(move |error: &GemflowError| match error {
        GemflowError::Transport(_) | GemflowError::Io(_) => true,
        GemflowError::Http(e) => match e.status() {
            Some(status) => codes.contains(&status.as_u16()),
            None => true,
        },
        GemflowError::QuotaExceeded(_) | GemflowError::HttpStatus { .. } => error
            .status_code()
            .map(|code| codes.contains(&code))
            .unwrap_or(false),
        _ => false,
    })
}

/// One invocation of the retried operation.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub attempt_number: u32,
    /// Failure of this attempt, `None` on success.
    pub error: Option<GemflowError>,
    /// Wait applied before the next attempt; zero for the last one.
    pub delay_before_next: Duration,
}

/// Final result of a retried operation, tagged with its attempt history.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    pub attempts: Vec<RetryAttempt>,
}

impl<T> RetryOutcome<T> {
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    /// Retries performed after the initial attempt.
    pub fn retry_count(&self) -> u32 {
        self.attempt_count().saturating_sub(1)
    }

    pub fn into_result(self) -> Result<T> {
        self.result
    }
}

/// Runs an operation under a [`RetryConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation` until it succeeds, fails with a non-retryable
    /// error, or `max_retries` retries have been spent.
    /// - Uses Google's retryDelay hint if available
    /// - Falls back to exponential backoff
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.config.create_backoff();
        let mut attempts = Vec::new();
        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation_name, attempt);
                    }
                    attempts.push(RetryAttempt {
                        attempt_number: attempt,
                        error: None,
                        delay_before_next: Duration::ZERO,
                    });
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                    };
                }
                Err(error) => {
                    if !(self.config.retryable)(&error) || attempt >= max_attempts {
                        if attempt > 1 {
                            warn!(
                                "{} failed after {} attempt(s): {}",
                                operation_name, attempt, error
                            );
                        }
                        attempts.push(RetryAttempt {
                            attempt_number: attempt,
                            error: Some(error.clone()),
                            delay_before_next: Duration::ZERO,
                        });
                        return RetryOutcome {
                            result: Err(error),
                            attempts,
                        };
                    }

                    let computed = backoff.next_backoff().unwrap_or(self.config.max_delay);
                    let delay = match error.body().and_then(parse_retry_delay) {
                        Some(hint) => {
                            debug!(
                                "{} failed (attempt {}), server suggests waiting {}ms",
                                operation_name,
                                attempt,
                                hint.as_millis()
                            );
                            hint.min(self.config.max_delay)
                        }
                        None => {
                            debug!(
                                "{} failed (attempt {}): {}; retrying after {}ms",
                                operation_name,
                                attempt,
                                error,
                                computed.as_millis()
                            );
                            computed
                        }
                    };

                    crate::metrics::record_retry_attempt();
                    attempts.push(RetryAttempt {
                        attempt_number: attempt,
                        error: Some(error),
                        delay_before_next: delay,
                    });

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Parse Google's retryDelay duration string from an error body
/// (e.g. `"0.457639761s"`, `"40s"`), capped at 60 seconds.
pub fn parse_retry_delay(error_json: &str) -> Option<Duration> {
    let parsed: Value = serde_json::from_str(error_json).ok()?;

    // Navigate: error.details[] -> find RetryInfo -> retryDelay
    let details = parsed.get("error")?.get("details")?.as_array()?;

    for detail in details {
        if detail.get("@type").and_then(|t| t.as_str())
            == Some("type.googleapis.com/google.rpc.RetryInfo")
        {
            if let Some(retry_delay) = detail.get("retryDelay").and_then(|v| v.as_str()) {
                return parse_duration_string(retry_delay);
            }
        }
    }

    None
}

/// Parse duration strings like "0.457639761s", "40s", "1.5s"
fn parse_duration_string(duration_str: &str) -> Option<Duration> {
    let seconds: f64 = duration_str.strip_suffix('s')?.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    let millis = (seconds * 1000.0) as u64;
    Some(Duration::from_millis(millis).min(MAX_HINTED_DELAY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries, Duration::from_millis(100), 2.0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_operation_makes_max_retries_plus_one_attempts() {
        let executor = RetryExecutor::new(fast_config(3));
        let calls = AtomicU32::new(0);

        let outcome: RetryOutcome<()> = executor
            .execute("always-fails", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GemflowError::Transport("connection reset".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.attempt_count(), 4);
        assert_eq!(outcome.retry_count(), 3);
        assert!(matches!(outcome.result, Err(GemflowError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_grow_exponentially() {
        let executor = RetryExecutor::new(fast_config(3));

        let outcome: RetryOutcome<()> = executor
            .execute("delays", || async {
                Err(GemflowError::from_status(503, "unavailable".into()))
            })
            .await;

        let delays: Vec<u128> = outcome
            .attempts
            .iter()
            .map(|a| a.delay_before_next.as_millis())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let executor = RetryExecutor::new(fast_config(3));
        let calls = AtomicU32::new(0);

        let outcome: RetryOutcome<()> = executor
            .execute("bad-request", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GemflowError::from_status(400, "bad".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempt_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let executor = RetryExecutor::new(fast_config(3));
        let calls = AtomicU32::new(0);

        let outcome = executor
            .execute("flaky", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(GemflowError::from_status(429, "quota".into()))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(outcome.attempt_count(), 3);
        assert_eq!(outcome.into_result().unwrap(), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_status_codes() {
        let config = fast_config(2).with_retryable_status_codes(vec![503]);
        let executor = RetryExecutor::new(config);

        let outcome: RetryOutcome<()> = executor
            .execute("quota", || async {
                Err(GemflowError::from_status(429, "quota".into()))
            })
            .await;
        assert_eq!(outcome.attempt_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_hint_overrides_backoff() {
        let body = r#"{"error":{"code":429,"details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"2.5s"}]}}"#;
        let executor = RetryExecutor::new(fast_config(1));

        let outcome: RetryOutcome<()> = executor
            .execute("hinted", || async {
                Err(GemflowError::from_status(429, body.to_string()))
            })
            .await;

        assert_eq!(outcome.attempts[0].delay_before_next, Duration::from_millis(2500));
    }

    #[test]
    fn test_parse_retry_delay() {
        let error_json = r#"{
  "error": {
    "code": 429,
    "message": "Rate limited",
    "details": [
      {
        "@type": "type.googleapis.com/google.rpc.RetryInfo",
        "retryDelay": "0.457639761s"
      }
    ]
  }
}"#;
        let delay = parse_retry_delay(error_json).unwrap();
        assert_eq!(delay.as_millis(), 457);
    }

    #[test]
    fn test_parse_duration_string() {
        assert_eq!(parse_duration_string("40s").unwrap().as_secs(), 40);
        assert_eq!(parse_duration_string("1.5s").unwrap().as_millis(), 1500);
        assert_eq!(parse_duration_string("120s").unwrap().as_secs(), 60);
        assert!(parse_duration_string("abc").is_none());
    }

    #[test]
    fn test_default_predicate() {
        let config = RetryConfig::default();
        assert!((config.retryable)(&GemflowError::Transport("reset".into())));
        assert!((config.retryable)(&GemflowError::from_status(429, String::new())));
        assert!((config.retryable)(&GemflowError::from_status(502, String::new())));
        assert!(!(config.retryable)(&GemflowError::from_status(401, String::new())));
        assert!(!(config.retryable)(&GemflowError::SafetyFilterBlocked("x".into())));
        assert!(!(config.retryable)(&GemflowError::Decoding("x".into())));
    }
}
