// Wire boundary between the orchestration core and the Gemini API
// Author: kelexine (https://github.com/kelexine)

mod http;

pub use http::HttpTransport;

use crate::batch::{BatchRequest, BatchResultItem, BatchStatusReport};
use crate::credentials::Credential;
use crate::error::Result;
use crate::models::{GenerateContentResponse, GenerateRequest};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Raw body of a streaming response.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// The calls the orchestration layer makes against the remote service.
///
/// Every call carries exactly one credential. Implementations perform a
/// single attempt; retries, caching and credential selection live above
/// this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Unary generateContent call.
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerateRequest,
        trace_id: &str,
    ) -> Result<GenerateContentResponse>;

    /// streamGenerateContent call; returns the SSE-framed body.
    async fn stream(&self, credential: &Credential, request: &GenerateRequest)
        -> Result<ByteStream>;

    /// Submit all requests as one job. Returns the server's initial view of it.
    async fn submit_batch(
        &self,
        credential: &Credential,
        model: &str,
        display_name: &str,
        requests: &[BatchRequest],
    ) -> Result<BatchStatusReport>;

    async fn batch_status(&self, credential: &Credential, job_id: &str)
        -> Result<BatchStatusReport>;

    async fn batch_results(
        &self,
        credential: &Credential,
        job_id: &str,
    ) -> Result<Vec<BatchResultItem>>;

    async fn cancel_batch(&self, credential: &Credential, job_id: &str) -> Result<()>;
}
