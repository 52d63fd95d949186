// Batch job submission and tracking
// Author: kelexine (https://github.com/kelexine)

mod manager;
pub mod models;

pub use manager::BatchJobManager;
pub use models::{
    BatchItemStatus, BatchJob, BatchRequest, BatchResponse, BatchResultItem, BatchStatus,
    BatchStatusReport,
};

use std::time::Duration;

/// Limits and pacing for batch jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Most requests accepted in one job.
    pub max_batch_size: usize,
    /// How long `wait_for_completion` polls before giving up.
    pub batch_timeout: Duration,
    pub polling_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            batch_timeout: Duration::from_secs(3600),
            polling_interval: Duration::from_secs(10),
        }
    }
}
