// reqwest transport for the public Gemini API
// Author: kelexine (https://github.com/kelexine)

use super::{ByteStream, Transport};
use crate::batch::{BatchRequest, BatchResultItem, BatchStatus, BatchStatusReport};
use crate::config::GeminiConfig;
use crate::credentials::Credential;
use crate::error::{extract_error_message, GemflowError, Result};
use crate::models::{GenerateContentResponse, GenerateRequest};
use crate::utils::logging::sanitize;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

const API_KEY_HEADER: &str = "x-goog-api-key";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTPS JSON transport for the Gemini API.
///
/// The credential travels in the `x-goog-api-key` header. Unary and batch
/// calls are bounded by the configured timeout; streaming calls are not,
/// since their liveness is governed by the stream's chunk timeout.
#[derive(Clone)]
pub struct HttpTransport {
    http_client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        // Configure HTTP client for optimal streaming performance
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .build()
            .map_err(|e| GemflowError::Config(format!("Failed to create HTTP client: {}", e)))?;

        debug!("Created HTTP client with connection pooling and keep-alive");

        Ok(Self {
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!(
            "{}/models/{}:{}",
            self.base_url,
            urlencoding::encode(model),
            method
        )
    }

    fn job_url(&self, job_id: &str, suffix: &str) -> String {
        format!("{}/{}{}", self.base_url, job_id.trim_start_matches('/'), suffix)
    }

    fn request(&self, method: Method, url: &str, credential: &Credential) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header(API_KEY_HEADER, credential.expose())
            .header("Content-Type", "application/json")
    }

    /// Send a request and return the body text of a successful response.
    async fn execute(&self, builder: RequestBuilder, operation: &str) -> Result<String> {
        let response = builder
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| GemflowError::Transport(format!("{} request failed: {}", operation, e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            GemflowError::Transport(format!("{}: failed to read response body: {}", operation, e))
        })?;

        if !status.is_success() {
            error!(
                "{} failed: HTTP {} - {}",
                operation,
                status,
                sanitize(&extract_error_message(&body).unwrap_or_else(|| body.clone()))
            );
            return Err(GemflowError::from_status(status.as_u16(), body));
        }

        Ok(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerateRequest,
        trace_id: &str,
    ) -> Result<GenerateContentResponse> {
        let url = self.model_url(&request.model, "generateContent");
        debug!("Calling generateContent for model {} (trace {})", request.model, trace_id);

        let builder = self
            .request(Method::POST, &url, credential)
            .header(REQUEST_ID_HEADER, trace_id)
            .json(request);
        let body = self.execute(builder, "generateContent").await?;

        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            GemflowError::Decoding(format!("Response parsing error: {}", e))
        })
    }

    async fn stream(
        &self,
        credential: &Credential,
        request: &GenerateRequest,
    ) -> Result<ByteStream> {
        let url = format!("{}?alt=sse", self.model_url(&request.model, "streamGenerateContent"));
        debug!("Starting Gemini SSE stream for model {}", request.model);

        let response = self
            .request(Method::POST, &url, credential)
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| GemflowError::Transport(format!("stream request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Stream request failed: HTTP {} - {}", status, sanitize(&error_text));
            return Err(GemflowError::from_status(status.as_u16(), error_text));
        }

        let byte_stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk.map_err(|e| GemflowError::Transport(format!("stream read failed: {}", e)))
            });
        Ok(Box::pin(byte_stream))
    }

    async fn submit_batch(
        &self,
        credential: &Credential,
        model: &str,
        display_name: &str,
        requests: &[BatchRequest],
    ) -> Result<BatchStatusReport> {
        let url = self.model_url(model, "batchGenerateContent");
        let payload = SubmitBatchRequest {
            batch: BatchSpec {
                display_name,
                input_config: InputConfig {
                    requests: InlinedRequests {
                        requests: requests
                            .iter()
                            .map(|r| InlinedRequest {
                                request: &r.request,
                                metadata: RequestMetadata { key: &r.id },
                            })
                            .collect(),
                    },
                },
            },
        };

        debug!("Submitting batch of {} requests for model {}", requests.len(), model);
        let builder = self.request(Method::POST, &url, credential).json(&payload);
        let body = self.execute(builder, "batchGenerateContent").await?;
        parse_operation(&body)?.into_report()
    }

    async fn batch_status(
        &self,
        credential: &Credential,
        job_id: &str,
    ) -> Result<BatchStatusReport> {
        let url = self.job_url(job_id, "");
        let body = self
            .execute(self.request(Method::GET, &url, credential), "batch status")
            .await?;
        parse_operation(&body)?.into_report()
    }

    async fn batch_results(
        &self,
        credential: &Credential,
        job_id: &str,
    ) -> Result<Vec<BatchResultItem>> {
        let url = self.job_url(job_id, "");
        let body = self
            .execute(self.request(Method::GET, &url, credential), "batch results")
            .await?;
        parse_operation(&body)?.into_results()
    }

    async fn cancel_batch(&self, credential: &Credential, job_id: &str) -> Result<()> {
        let url = self.job_url(job_id, ":cancel");
        self.execute(self.request(Method::POST, &url, credential), "batch cancel")
            .await?;
        Ok(())
    }
}

// Batch wire format

#[derive(Serialize)]
struct SubmitBatchRequest<'a> {
    batch: BatchSpec<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchSpec<'a> {
    display_name: &'a str,
    input_config: InputConfig<'a>,
}

#[derive(Serialize)]
struct InputConfig<'a> {
    requests: InlinedRequests<'a>,
}

#[derive(Serialize)]
struct InlinedRequests<'a> {
    requests: Vec<InlinedRequest<'a>>,
}

#[derive(Serialize)]
struct InlinedRequest<'a> {
    request: &'a GenerateRequest,
    metadata: RequestMetadata<'a>,
}

#[derive(Serialize)]
struct RequestMetadata<'a> {
    key: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchOperation {
    name: Option<String>,
    #[serde(default)]
    metadata: Option<BatchMetadata>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    response: Option<BatchOutput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchMetadata {
    name: Option<String>,
    state: Option<String>,
    create_time: Option<DateTime<Utc>>,
    update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    batch_stats: BatchStats,
    output: Option<BatchOutput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchStats {
    #[serde(default, deserialize_with = "lenient_count")]
    request_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    successful_request_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    failed_request_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchOutput {
    responses_file: Option<String>,
    inlined_responses: Option<InlinedResponses>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlinedResponses {
    #[serde(default)]
    inlined_responses: Vec<InlinedResponse>,
}

#[derive(Debug, Deserialize)]
struct InlinedResponse {
    #[serde(default)]
    metadata: Option<ResponseMetadataWire>,
    response: Option<GenerateContentResponse>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadataWire {
    key: Option<String>,
}

/// int64 fields arrive as JSON strings under proto3 JSON mapping.
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

fn parse_operation(body: &str) -> Result<BatchOperation> {
    serde_json::from_str(body)
        .map_err(|e| GemflowError::Decoding(format!("Invalid batch operation: {}", e)))
}

fn error_text(error: &Value) -> String {
    error
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

impl BatchOperation {
    fn into_report(self) -> Result<BatchStatusReport> {
        let metadata = self.metadata.unwrap_or_default();
        let job_id = self
            .name
            .or(metadata.name)
            .ok_or_else(|| GemflowError::Decoding("batch operation has no name".to_string()))?;

        let status = match metadata.state.as_deref() {
            Some(state) => BatchStatus::from_wire(state),
            None if self.done && self.error.is_some() => BatchStatus::Failed,
            None if self.done => BatchStatus::Succeeded,
            None => BatchStatus::Pending,
        };

        let output_uri = metadata
            .output
            .and_then(|o| o.responses_file)
            .or_else(|| self.response.and_then(|r| r.responses_file));

        Ok(BatchStatusReport {
            job_id,
            status,
            create_time: metadata.create_time,
            update_time: metadata.update_time,
            total_count: metadata.batch_stats.request_count.map(|n| n as usize),
            completed_count: metadata.batch_stats.successful_request_count.unwrap_or(0) as usize,
            failed_count: metadata.batch_stats.failed_request_count.unwrap_or(0) as usize,
            output_uri,
        })
    }

    fn into_results(self) -> Result<Vec<BatchResultItem>> {
        let output = self
            .response
            .or_else(|| self.metadata.and_then(|m| m.output))
            .unwrap_or_default();

        match output.inlined_responses {
            Some(inlined) => Ok(inlined
                .inlined_responses
                .into_iter()
                .map(|item| BatchResultItem {
                    key: item
                        .metadata
                        .and_then(|m| m.key)
                        .unwrap_or_default(),
                    response: item.response,
                    error: item.error.as_ref().map(error_text),
                })
                .collect()),
            None => match output.responses_file {
                Some(file) => Err(GemflowError::Decoding(format!(
                    "results were written to file {} rather than returned inline",
                    file
                ))),
                None => Err(GemflowError::Decoding(
                    "batch operation carries no results".to_string(),
                )),
            },
        }
    }
}
