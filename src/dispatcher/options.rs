// Per-call options and response metadata
// Author: kelexine (https://github.com/kelexine)

use crate::models::GenerateContentResponse;
use std::time::Duration;

/// How a logical request is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    Unary,
    Stream,
    Batch,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Unary => "unary",
            ExecutionMode::Stream => "stream",
            ExecutionMode::Batch => "batch",
        }
    }
}

/// Per-call overrides for a unary request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Neither read nor write the response cache.
    pub skip_cache: bool,
    /// Make exactly one attempt.
    pub skip_retry: bool,
    /// Upper bound on the whole call, retries and backoff included.
    pub custom_timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    pub fn skip_retry(mut self) -> Self {
        self.skip_retry = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.custom_timeout = Some(timeout);
        self
    }
}

/// What happened while serving a unary request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMetadata {
    pub from_cache: bool,
    /// Retries after the first attempt; `0` for cache hits.
    pub retry_count: u32,
    pub duration: Duration,
    /// Sent upstream as `x-request-id`.
    pub trace_id: String,
}

/// A unary response with its metadata.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub response: GenerateContentResponse,
    pub metadata: ResponseMetadata,
}

impl GenerateOutcome {
    pub fn text(&self) -> String {
        self.response.text()
    }
}
