//! Batch job data models.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::models::{GenerateContentResponse, GenerateRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a batch job.
///
/// `Pending → Running → {Succeeded | Failed | Cancelled}`; the last three
/// are terminal and absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Succeeded | BatchStatus::Failed | BatchStatus::Cancelled
        )
    }

    /// Map a server state name (`BATCH_STATE_*` or `JOB_STATE_*`).
    ///
    /// Expired jobs count as failed; unknown or unspecified states are
    /// treated as still pending.
    pub fn from_wire(state: &str) -> Self {
        let name = state
            .strip_prefix("BATCH_STATE_")
            .or_else(|| state.strip_prefix("JOB_STATE_"))
            .unwrap_or(state);
        match name {
            "RUNNING" | "CANCELLING" => BatchStatus::Running,
            "SUCCEEDED" => BatchStatus::Succeeded,
            "FAILED" | "EXPIRED" => BatchStatus::Failed,
            "CANCELLED" => BatchStatus::Cancelled,
            _ => BatchStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Running => "running",
            BatchStatus::Succeeded => "succeeded",
            BatchStatus::Failed => "failed",
            BatchStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request inside a batch, identified by an id unique within the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    /// Caller-assigned id; an empty id is replaced on submission.
    pub id: String,
    pub request: GenerateRequest,
}

impl BatchRequest {
    pub fn new(id: impl Into<String>, request: GenerateRequest) -> Self {
        Self {
            id: id.into(),
            request,
        }
    }

    /// Request whose id is assigned at submission time.
    pub fn auto(request: GenerateRequest) -> Self {
        Self {
            id: String::new(),
            request,
        }
    }
}

/// Locally tracked mirror of a server-side batch job.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    pub job_id: String,
    pub status: BatchStatus,
    pub create_time: DateTime<Utc>,
    pub update_time: Option<DateTime<Utc>>,
    pub completed_count: usize,
    pub failed_count: usize,
    pub total_count: usize,
    pub output_uri: Option<String>,
    /// Ids of the submitted requests, in submission order.
    pub request_ids: Vec<String>,
}

impl BatchJob {
    /// Fraction of requests that reached a final per-item state.
    pub fn progress(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        ((self.completed_count + self.failed_count) as f64 / self.total_count as f64).min(1.0)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Per-request state inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Result row for one submitted request id.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResponse {
    pub id: String,
    pub response: Option<GenerateContentResponse>,
    pub error: Option<String>,
    pub status: BatchItemStatus,
}

/// Job state as reported by one status call.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStatusReport {
    pub job_id: String,
    pub status: BatchStatus,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    pub total_count: Option<usize>,
    pub completed_count: usize,
    pub failed_count: usize,
    pub output_uri: Option<String>,
}

/// One item of a results call, keyed by the submitted request id.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResultItem {
    pub key: String,
    pub response: Option<GenerateContentResponse>,
    pub error: Option<String>,
}
