// Error types for the gemflow orchestration layer
// Author: kelexine (https://github.com/kelexine)

use crate::batch::BatchStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GemflowError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {code}: {body}")]
    HttpStatus { code: u16, body: String },

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Blocked by safety filter: {0}")]
    SafetyFilterBlocked(String),

    #[error("Batch contains no requests")]
    EmptyBatch,

    #[error("Batch of {count} requests exceeds the maximum of {max}")]
    BatchTooLarge { count: usize, max: usize },

    #[error("Batch submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Batch job ended in state {0}")]
    JobFailed(BatchStatus),

    #[error("Batch job did not finish within {0:?}")]
    BatchTimeout(Duration),

    #[error("Batch status check failed: {0}")]
    StatusCheckFailed(String),

    #[error("Batch results fetch failed: {0}")]
    ResultsFetchFailed(String),

    #[error("Batch cancellation failed: {0}")]
    CancellationFailed(String),

    #[error("No stream chunk received within {0:?}")]
    StreamTimeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),
}

/// Stable, machine-readable classification of a [`GemflowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    HttpStatus,
    Decoding,
    QuotaExceeded,
    SafetyFilterBlocked,
    EmptyBatch,
    BatchTooLarge,
    SubmissionFailed,
    JobFailed,
    BatchTimeout,
    StatusCheckFailed,
    ResultsFetchFailed,
    CancellationFailed,
    StreamTimeout,
    Config,
    InvalidRequest,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::HttpStatus => "http_status",
            ErrorKind::Decoding => "decoding",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::SafetyFilterBlocked => "safety_filter_blocked",
            ErrorKind::EmptyBatch => "empty_batch",
            ErrorKind::BatchTooLarge => "batch_too_large",
            ErrorKind::SubmissionFailed => "submission_failed",
            ErrorKind::JobFailed => "job_failed",
            ErrorKind::BatchTimeout => "batch_timeout",
            ErrorKind::StatusCheckFailed => "status_check_failed",
            ErrorKind::ResultsFetchFailed => "results_fetch_failed",
            ErrorKind::CancellationFailed => "cancellation_failed",
            ErrorKind::StreamTimeout => "stream_timeout",
            ErrorKind::Config => "config",
            ErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

impl GemflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GemflowError::Transport(_) | GemflowError::Http(_) | GemflowError::Io(_) => {
                ErrorKind::Transport
            }
            GemflowError::HttpStatus { .. } => ErrorKind::HttpStatus,
            GemflowError::Decoding(_) | GemflowError::Json(_) => ErrorKind::Decoding,
            GemflowError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            GemflowError::SafetyFilterBlocked(_) => ErrorKind::SafetyFilterBlocked,
            GemflowError::EmptyBatch => ErrorKind::EmptyBatch,
            GemflowError::BatchTooLarge { .. } => ErrorKind::BatchTooLarge,
            GemflowError::SubmissionFailed(_) => ErrorKind::SubmissionFailed,
            GemflowError::JobFailed(_) => ErrorKind::JobFailed,
            GemflowError::BatchTimeout(_) => ErrorKind::BatchTimeout,
            GemflowError::StatusCheckFailed(_) => ErrorKind::StatusCheckFailed,
            GemflowError::ResultsFetchFailed(_) => ErrorKind::ResultsFetchFailed,
            GemflowError::CancellationFailed(_) => ErrorKind::CancellationFailed,
            GemflowError::StreamTimeout(_) => ErrorKind::StreamTimeout,
            GemflowError::Config(_) | GemflowError::ConfigParsing(_) => ErrorKind::Config,
            GemflowError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// HTTP status associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GemflowError::HttpStatus { code, .. } => Some(*code),
            GemflowError::QuotaExceeded(_) => Some(429),
            GemflowError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether a blind retry of the same request could plausibly succeed.
    ///
    /// This is the fallback classification; `RetryConfig` carries the
    /// configurable predicate actually used by the retry executor.
    pub fn is_transient(&self) -> bool {
        match self {
            GemflowError::Transport(_) | GemflowError::Io(_) => true,
            GemflowError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            GemflowError::QuotaExceeded(_) => true,
            GemflowError::HttpStatus { code, .. } => *code >= 500,
            _ => false,
        }
    }

    /// Map a non-success HTTP response to the error taxonomy.
    ///
    /// 429 is surfaced as `QuotaExceeded` so callers can back off credential usage.
    pub fn from_status(code: u16, body: String) -> Self {
        match code {
            429 => GemflowError::QuotaExceeded(body),
            _ => GemflowError::HttpStatus { code, body },
        }
    }

    /// Raw error body as returned by the server, used for retry hints.
    pub fn body(&self) -> Option<&str> {
        match self {
            GemflowError::HttpStatus { body, .. } | GemflowError::QuotaExceeded(body) => {
                Some(body)
            }
            _ => None,
        }
    }
}

impl Clone for GemflowError {
    // reqwest/io/config errors are not Clone; they collapse into their kind's
    // string-carrying variant.
    fn clone(&self) -> Self {
        match self {
            GemflowError::Transport(s) => GemflowError::Transport(s.clone()),
            GemflowError::HttpStatus { code, body } => GemflowError::HttpStatus {
                code: *code,
                body: body.clone(),
            },
            GemflowError::Decoding(s) => GemflowError::Decoding(s.clone()),
            GemflowError::QuotaExceeded(s) => GemflowError::QuotaExceeded(s.clone()),
            GemflowError::SafetyFilterBlocked(s) => GemflowError::SafetyFilterBlocked(s.clone()),
            GemflowError::EmptyBatch => GemflowError::EmptyBatch,
            GemflowError::BatchTooLarge { count, max } => GemflowError::BatchTooLarge {
                count: *count,
                max: *max,
            },
            GemflowError::SubmissionFailed(s) => GemflowError::SubmissionFailed(s.clone()),
            GemflowError::JobFailed(status) => GemflowError::JobFailed(*status),
            GemflowError::BatchTimeout(d) => GemflowError::BatchTimeout(*d),
            GemflowError::StatusCheckFailed(s) => GemflowError::StatusCheckFailed(s.clone()),
            GemflowError::ResultsFetchFailed(s) => GemflowError::ResultsFetchFailed(s.clone()),
            GemflowError::CancellationFailed(s) => GemflowError::CancellationFailed(s.clone()),
            GemflowError::StreamTimeout(d) => GemflowError::StreamTimeout(*d),
            GemflowError::Config(s) => GemflowError::Config(s.clone()),
            GemflowError::InvalidRequest(s) => GemflowError::InvalidRequest(s.clone()),
            GemflowError::Io(e) => GemflowError::Transport(e.to_string()),
            GemflowError::Json(e) => GemflowError::Decoding(e.to_string()),
            GemflowError::Http(e) => match e.status() {
                Some(status) => GemflowError::from_status(status.as_u16(), e.to_string()),
                None => GemflowError::Transport(e.to_string()),
            },
            GemflowError::ConfigParsing(e) => GemflowError::Config(e.to_string()),
        }
    }
}

/// Extract the human-readable message from a Google API error body.
pub fn extract_error_message(response_text: &str) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: Option<String>,
        status: Option<String>,
    }

    if let Ok(error_resp) = serde_json::from_str::<ErrorResponse>(response_text) {
        if let Some(error) = error_resp.error {
            return error.message.or(error.status);
        }
    }
    None
}

pub type Result<T> = std::result::Result<T, GemflowError>;
