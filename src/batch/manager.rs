// Batch job lifecycle: submit, poll, collect, cancel
// Author: kelexine (https://github.com/kelexine)

use super::models::{
    BatchItemStatus, BatchJob, BatchRequest, BatchResponse, BatchResultItem, BatchStatus,
    BatchStatusReport,
};
use super::BatchConfig;
use crate::credentials::{Credential, CredentialPool};
use crate::error::{GemflowError, Result};
use crate::transport::Transport;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct TrackedJob {
    job: BatchJob,
    /// Key used at submission; jobs belong to the key's project, so every
    /// later call for this job reuses it.
    credential: Credential,
}

/// Tracks batch jobs locally, mirroring server state.
///
/// The job table is guarded by one mutex that is never held across an
/// await, so concurrent pollers and cancellers of the same job serialize
/// their updates. Terminal states are absorbing: once a job is recorded as
/// succeeded, failed or cancelled, later status reports cannot move it.
/// Submission is never retried automatically.
#[derive(Clone)]
pub struct BatchJobManager {
    transport: Arc<dyn Transport>,
    credentials: CredentialPool,
    config: BatchConfig,
    jobs: Arc<Mutex<HashMap<String, TrackedJob>>>,
}

impl BatchJobManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: CredentialPool,
        config: BatchConfig,
    ) -> Self {
        Self {
            transport,
            credentials,
            config,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Submit `requests` as one job.
    ///
    /// Empty ids are replaced with generated ones; ids must be unique and
    /// all requests must target the same model.
    pub async fn submit_batch(&self, requests: Vec<BatchRequest>) -> Result<BatchJob> {
        if requests.is_empty() {
            return Err(GemflowError::EmptyBatch);
        }
        if requests.len() > self.config.max_batch_size {
            return Err(GemflowError::BatchTooLarge {
                count: requests.len(),
                max: self.config.max_batch_size,
            });
        }

        let requests = assign_ids(requests)?;
        let model = requests[0].request.model.clone();
        if model.is_empty() {
            return Err(GemflowError::InvalidRequest(
                "batch requests must name a model".to_string(),
            ));
        }
        if let Some(other) = requests.iter().find(|r| r.request.model != model) {
            return Err(GemflowError::InvalidRequest(format!(
                "batch mixes models {} and {}",
                model, other.request.model
            )));
        }

        let credential = self.credentials.next();
        let display_name = format!("gemflow-batch-{}", uuid::Uuid::new_v4().simple());

        let report = self
            .transport
            .submit_batch(&credential, &model, &display_name, &requests)
            .await
            .map_err(|e| GemflowError::SubmissionFailed(e.to_string()))?;

        let job = BatchJob {
            job_id: report.job_id,
            status: BatchStatus::Pending,
            create_time: report.create_time.unwrap_or_else(Utc::now),
            update_time: None,
            completed_count: 0,
            failed_count: 0,
            total_count: requests.len(),
            output_uri: None,
            request_ids: requests.into_iter().map(|r| r.id).collect(),
        };

        info!("Submitted batch job {} with {} requests", job.job_id, job.total_count);
        crate::metrics::record_batch_job("submitted");

        self.jobs.lock().insert(
            job.job_id.clone(),
            TrackedJob {
                job: job.clone(),
                credential,
            },
        );
        Ok(job)
    }

    /// Fetch the server's view of a job and merge it into the local record.
    pub async fn get_job_status(&self, job_id: &str) -> Result<BatchJob> {
        let credential = self.credential_for(job_id);
        let report = self
            .transport
            .batch_status(&credential, job_id)
            .await
            .map_err(|e| GemflowError::StatusCheckFailed(format!("{}: {}", job_id, e)))?;
        crate::metrics::record_batch_poll();

        let job = self.merge_report(job_id, report, credential);
        debug!(
            "Batch job {} is {} ({:.0}% done)",
            job.job_id,
            job.status,
            job.progress() * 100.0
        );
        Ok(job)
    }

    /// Poll until the job is terminal, then collect its results.
    ///
    /// Fails with `BatchTimeout` once `batch_timeout` has elapsed and with
    /// `JobFailed` if the job ends in any state other than succeeded.
    pub async fn wait_for_completion(&self, job_id: &str) -> Result<Vec<BatchResponse>> {
        self.poll_until_terminal(job_id, |_| {}).await?;
        self.get_results(job_id).await
    }

    /// Fetch one result row per submitted request id.
    ///
    /// A row's status is `Completed` when the item carries no error and
    /// `Failed` otherwise. A submitted id the server returned nothing for
    /// gets a `Failed` row; results for unknown ids are dropped.
    pub async fn get_results(&self, job_id: &str) -> Result<Vec<BatchResponse>> {
        let credential = self.credential_for(job_id);
        let items = self
            .transport
            .batch_results(&credential, job_id)
            .await
            .map_err(|e| GemflowError::ResultsFetchFailed(format!("{}: {}", job_id, e)))?;

        let request_ids = self
            .jobs
            .lock()
            .get(job_id)
            .map(|t| t.job.request_ids.clone())
            .unwrap_or_default();

        let responses = correlate_results(&request_ids, items);
        debug!("Collected {} results for batch job {}", responses.len(), job_id);
        Ok(responses)
    }

    /// Ask the server to cancel a job.
    ///
    /// Cancelling a job already known to be terminal is a no-op.
    pub async fn cancel_job(&self, job_id: &str) -> Result<()> {
        if let Some(status) = self.jobs.lock().get(job_id).map(|t| t.job.status) {
            if status.is_terminal() {
                debug!("Batch job {} already {}; cancel is a no-op", job_id, status);
                return Ok(());
            }
        }

        let credential = self.credential_for(job_id);
        self.transport
            .cancel_batch(&credential, job_id)
            .await
            .map_err(|e| GemflowError::CancellationFailed(format!("{}: {}", job_id, e)))?;

        if let Some(tracked) = self.jobs.lock().get_mut(job_id) {
            if !tracked.job.status.is_terminal() {
                tracked.job.status = BatchStatus::Cancelled;
                tracked.job.update_time = Some(Utc::now());
            }
        }

        info!("Cancelled batch job {}", job_id);
        crate::metrics::record_batch_job(BatchStatus::Cancelled.as_str());
        Ok(())
    }

    /// Submit, poll with progress callbacks, and collect results.
    ///
    /// `on_progress` is called after every status check, including the
    /// first, before the terminal-state check.
    pub async fn process_with_progress<F>(
        &self,
        requests: Vec<BatchRequest>,
        on_progress: F,
    ) -> Result<Vec<BatchResponse>>
    where
        F: FnMut(f64),
    {
        let job = self.submit_batch(requests).await?;
        self.poll_until_terminal(&job.job_id, on_progress).await?;
        self.get_results(&job.job_id).await
    }

    /// Snapshot of one tracked job.
    pub fn job(&self, job_id: &str) -> Option<BatchJob> {
        self.jobs.lock().get(job_id).map(|t| t.job.clone())
    }

    /// Snapshot of every tracked job.
    pub fn tracked_jobs(&self) -> Vec<BatchJob> {
        self.jobs.lock().values().map(|t| t.job.clone()).collect()
    }

    /// Stop tracking a job locally.
    pub fn forget(&self, job_id: &str) -> Option<BatchJob> {
        self.jobs.lock().remove(job_id).map(|t| t.job)
    }

    async fn poll_until_terminal<F>(&self, job_id: &str, mut on_progress: F) -> Result<BatchJob>
    where
        F: FnMut(f64),
    {
        let timeout = self.config.batch_timeout;
        let deadline = Instant::now() + timeout;

        loop {
            let job = self.get_job_status(job_id).await?;
            on_progress(job.progress());

            if job.is_terminal() {
                crate::metrics::record_batch_job(job.status.as_str());
                return match job.status {
                    BatchStatus::Succeeded => {
                        info!("Batch job {} succeeded", job_id);
                        Ok(job)
                    }
                    status => {
                        warn!("Batch job {} ended as {}", job_id, status);
                        Err(GemflowError::JobFailed(status))
                    }
                };
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("Batch job {} still {} after {:?}", job_id, job.status, timeout);
                return Err(GemflowError::BatchTimeout(timeout));
            }
            tokio::time::sleep(self.config.polling_interval.min(deadline - now)).await;
        }
    }

    fn credential_for(&self, job_id: &str) -> Credential {
        let pinned = self.jobs.lock().get(job_id).map(|t| t.credential.clone());
        pinned.unwrap_or_else(|| self.credentials.next())
    }

    fn merge_report(
        &self,
        job_id: &str,
        report: BatchStatusReport,
        credential: Credential,
    ) -> BatchJob {
        let mut jobs = self.jobs.lock();
        let tracked = jobs.entry(job_id.to_string()).or_insert_with(|| TrackedJob {
            job: BatchJob {
                job_id: job_id.to_string(),
                status: BatchStatus::Pending,
                create_time: report.create_time.unwrap_or_else(Utc::now),
                update_time: None,
                completed_count: 0,
                failed_count: 0,
                total_count: 0,
                output_uri: None,
                request_ids: Vec::new(),
            },
            credential,
        });

        let job = &mut tracked.job;
        if !job.status.is_terminal() {
            job.status = report.status;
        }
        job.completed_count = report.completed_count;
        job.failed_count = report.failed_count;
        if let Some(total) = report.total_count {
            job.total_count = total;
        }
        job.update_time = Some(report.update_time.unwrap_or_else(Utc::now));
        if report.output_uri.is_some() {
            job.output_uri = report.output_uri;
        }
        job.clone()
    }
}

/// Give every request a unique id, generating one where it is empty.
fn assign_ids(mut requests: Vec<BatchRequest>) -> Result<Vec<BatchRequest>> {
    let mut seen = HashSet::new();
    for request in &mut requests {
        if request.id.is_empty() {
            request.id = format!("req-{}", uuid::Uuid::new_v4().simple());
        }
        if !seen.insert(request.id.clone()) {
            return Err(GemflowError::InvalidRequest(format!(
                "duplicate batch request id: {}",
                request.id
            )));
        }
    }
    Ok(requests)
}

/// Associate result items with submitted ids by key, never by position.
fn correlate_results(request_ids: &[String], items: Vec<BatchResultItem>) -> Vec<BatchResponse> {
    let to_response = |id: String, item: BatchResultItem| {
        let status = if item.error.is_none() {
            BatchItemStatus::Completed
        } else {
            BatchItemStatus::Failed
        };
        BatchResponse {
            id,
            response: item.response,
            error: item.error,
            status,
        }
    };

    // Untracked job: report whatever the server returned.
    if request_ids.is_empty() {
        return items
            .into_iter()
            .map(|item| to_response(item.key.clone(), item))
            .collect();
    }

    let mut by_key: HashMap<String, BatchResultItem> = HashMap::new();
    for item in items {
        if !request_ids.contains(&item.key) {
            warn!("Dropping batch result for unknown request id {:?}", item.key);
            continue;
        }
        by_key.entry(item.key.clone()).or_insert(item);
    }

    request_ids
        .iter()
        .map(|id| match by_key.remove(id) {
            Some(item) => to_response(id.clone(), item),
            None => BatchResponse {
                id: id.clone(),
                response: None,
                error: Some("no result returned for this request".to_string()),
                status: BatchItemStatus::Failed,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenerateRequest;

    fn item(key: &str, error: Option<&str>) -> BatchResultItem {
        BatchResultItem {
            key: key.to_string(),
            response: None,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_assign_ids_fills_blanks() {
        let requests = vec![
            BatchRequest::auto(GenerateRequest::text("m", "a")),
            BatchRequest::new("mine", GenerateRequest::text("m", "b")),
        ];
        let assigned = assign_ids(requests).unwrap();
        assert!(assigned[0].id.starts_with("req-"));
        assert_eq!(assigned[1].id, "mine");
    }

    #[test]
    fn test_assign_ids_rejects_duplicates() {
        let requests = vec![
            BatchRequest::new("same", GenerateRequest::text("m", "a")),
            BatchRequest::new("same", GenerateRequest::text("m", "b")),
        ];
        assert!(matches!(assign_ids(requests), Err(GemflowError::InvalidRequest(_))));
    }

    #[test]
    fn test_correlate_by_key_not_position() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let items = vec![item("c", None), item("a", Some("boom")), item("zzz", None)];

        let rows = correlate_results(&ids, items);
        let summary: Vec<(&str, BatchItemStatus)> =
            rows.iter().map(|r| (r.id.as_str(), r.status)).collect();
        assert_eq!(
            summary,
            vec![
                ("a", BatchItemStatus::Failed),
                ("b", BatchItemStatus::Failed),
                ("c", BatchItemStatus::Completed),
            ]
        );
        assert_eq!(rows[0].error.as_deref(), Some("boom"));
        assert!(rows[1].error.is_some());
    }
}
