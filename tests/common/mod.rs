// Scripted in-memory transport shared by the integration tests
// Author: kelexine (https://github.com/kelexine)

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use gemflow::batch::{BatchRequest, BatchResultItem, BatchStatus, BatchStatusReport};
use gemflow::credentials::Credential;
use gemflow::error::{GemflowError, Result};
use gemflow::models::{GenerateContentResponse, GenerateRequest};
use gemflow::transport::{ByteStream, Transport};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub key: String,
    pub model: String,
    pub prompt: String,
    pub trace_id: String,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub key: String,
    pub model: String,
    pub ids: Vec<String>,
}

/// Answers transport calls from queued scripts and records every call.
///
/// Unscripted `generate` calls echo the prompt back as `echo: <prompt>`.
/// Status calls replay the last report once the script runs dry.
#[derive(Default)]
pub struct ScriptedTransport {
    generate_script: Mutex<VecDeque<Result<GenerateContentResponse>>>,
    generate_delay: Mutex<Option<Duration>>,
    pub generate_calls: Mutex<Vec<GenerateCall>>,

    stream_bodies: Mutex<VecDeque<String>>,
    pub stream_keys: Mutex<Vec<String>>,

    submit_error: Mutex<Option<GemflowError>>,
    pub submissions: Mutex<Vec<Submission>>,

    status_script: Mutex<VecDeque<Result<BatchStatusReport>>>,
    last_status: Mutex<Option<BatchStatusReport>>,
    pub status_keys: Mutex<Vec<String>>,

    results: Mutex<Option<Vec<BatchResultItem>>>,
    pub cancels: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_generate(&self, result: Result<GenerateContentResponse>) {
        self.generate_script.lock().push_back(result);
    }

    pub fn set_generate_delay(&self, delay: Duration) {
        *self.generate_delay.lock() = Some(delay);
    }

    pub fn push_stream(&self, body: String) {
        self.stream_bodies.lock().push_back(body);
    }

    pub fn fail_submission(&self, error: GemflowError) {
        *self.submit_error.lock() = Some(error);
    }

    pub fn push_status(&self, report: Result<BatchStatusReport>) {
        self.status_script.lock().push_back(report);
    }

    pub fn set_results(&self, items: Vec<BatchResultItem>) {
        *self.results.lock() = Some(items);
    }

    pub fn generate_count(&self) -> usize {
        self.generate_calls.lock().len()
    }

    pub fn keys_used(&self) -> Vec<String> {
        self.generate_calls.lock().iter().map(|c| c.key.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerateRequest,
        trace_id: &str,
    ) -> Result<GenerateContentResponse> {
        let prompt = request.contents.first().map(|c| c.text()).unwrap_or_default();
        self.generate_calls.lock().push(GenerateCall {
            key: credential.expose().to_string(),
            model: request.model.clone(),
            prompt: prompt.clone(),
            trace_id: trace_id.to_string(),
        });

        let delay = *self.generate_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.generate_script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(text_response(&format!("echo: {}", prompt))))
    }

    async fn stream(
        &self,
        credential: &Credential,
        _request: &GenerateRequest,
    ) -> Result<ByteStream> {
        self.stream_keys.lock().push(credential.expose().to_string());
        let body = self
            .stream_bodies
            .lock()
            .pop_front()
            .ok_or_else(|| GemflowError::Transport("no stream scripted".into()))?;
        let pieces: Vec<Result<Bytes>> = vec![Ok(Bytes::from(body))];
        Ok(Box::pin(futures::stream::iter(pieces)))
    }

    async fn submit_batch(
        &self,
        credential: &Credential,
        model: &str,
        _display_name: &str,
        requests: &[BatchRequest],
    ) -> Result<BatchStatusReport> {
        if let Some(error) = self.submit_error.lock().take() {
            return Err(error);
        }

        let mut submissions = self.submissions.lock();
        submissions.push(Submission {
            key: credential.expose().to_string(),
            model: model.to_string(),
            ids: requests.iter().map(|r| r.id.clone()).collect(),
        });
        Ok(report(
            &format!("batches/job-{}", submissions.len()),
            BatchStatus::Pending,
            0,
            0,
        ))
    }

    async fn batch_status(
        &self,
        credential: &Credential,
        job_id: &str,
    ) -> Result<BatchStatusReport> {
        self.status_keys.lock().push(credential.expose().to_string());

        let next = self.status_script.lock().pop_front();
        match next {
            Some(Ok(mut report)) => {
                report.job_id = job_id.to_string();
                *self.last_status.lock() = Some(report.clone());
                Ok(report)
            }
            Some(Err(e)) => Err(e),
            None => self.last_status.lock().clone().ok_or_else(|| GemflowError::HttpStatus {
                code: 404,
                body: format!("job {} not found", job_id),
            }),
        }
    }

    async fn batch_results(
        &self,
        _credential: &Credential,
        _job_id: &str,
    ) -> Result<Vec<BatchResultItem>> {
        self.results
            .lock()
            .clone()
            .ok_or_else(|| GemflowError::Decoding("batch operation carries no results".into()))
    }

    async fn cancel_batch(&self, _credential: &Credential, job_id: &str) -> Result<()> {
        self.cancels.lock().push(job_id.to_string());
        Ok(())
    }
}

/// A one-candidate response carrying `text` and a STOP finish reason.
pub fn text_response(text: &str) -> GenerateContentResponse {
    serde_json::from_value(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 5, "totalTokenCount": 8}
    }))
    .unwrap()
}

pub fn blocked_response() -> GenerateContentResponse {
    serde_json::from_value(json!({
        "candidates": [],
        "promptFeedback": {"blockReason": "SAFETY"}
    }))
    .unwrap()
}

pub fn report(job_id: &str, status: BatchStatus, completed: usize, failed: usize) -> BatchStatusReport {
    BatchStatusReport {
        job_id: job_id.to_string(),
        status,
        create_time: None,
        update_time: None,
        total_count: None,
        completed_count: completed,
        failed_count: failed,
        output_uri: None,
    }
}

pub fn report_with_total(
    status: BatchStatus,
    total: usize,
    completed: usize,
    failed: usize,
) -> BatchStatusReport {
    BatchStatusReport {
        total_count: Some(total),
        ..report("", status, completed, failed)
    }
}

/// SSE body with one `data:` event per text piece; the last carries STOP.
pub fn sse_body(pieces: &[&str]) -> String {
    let last = pieces.len().saturating_sub(1);
    pieces
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let mut candidate = json!({"content": {"role": "model", "parts": [{"text": text}]}});
            if i == last {
                candidate["finishReason"] = json!("STOP");
            }
            format!("data: {}\n\n", json!({"candidates": [candidate]}))
        })
        .collect()
}
