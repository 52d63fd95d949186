// Request dispatcher: composition root of the orchestration layer
// Author: kelexine (https://github.com/kelexine)

mod options;
mod session;

pub use options::{ExecutionMode, GenerateOutcome, RequestOptions, ResponseMetadata};
pub use session::SessionClient;

use crate::batch::{BatchConfig, BatchJob, BatchJobManager, BatchRequest};
use crate::cache::{CacheConfig, CacheKey, ResponseCache};
use crate::concurrency::ConcurrencyLimiter;
use crate::config::AppConfig;
use crate::credentials::{Credential, CredentialPool};
use crate::error::{GemflowError, Result};
use crate::models::{GenerateContentResponse, GenerateRequest};
use crate::streaming::{ChunkStream, StreamingConfig};
use crate::transport::{HttpTransport, Transport};
use crate::utils::retry::{RetryConfig, RetryExecutor};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Result of [`RequestDispatcher::dispatch`], one variant per mode.
pub enum Dispatched {
    Response(GenerateOutcome),
    Stream(ChunkStream),
    Batch(BatchJob),
}

/// Routes logical requests through credentials, cache, retry, streaming
/// and batch handling.
///
/// Unary calls go cache → retry-wrapped transport call → cache store, with a
/// fresh pooled credential for every attempt. Streaming and batch calls
/// bypass the cache and the retry loop. Cloning is cheap; clones share the
/// pool, cache, limiter and batch job table.
#[derive(Clone)]
pub struct RequestDispatcher {
    credentials: CredentialPool,
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    retry: RetryExecutor,
    limiter: ConcurrencyLimiter,
    streaming: StreamingConfig,
    batch: BatchJobManager,
    default_model: String,
}

impl RequestDispatcher {
    pub fn builder(
        transport: Arc<dyn Transport>,
        credentials: CredentialPool,
    ) -> DispatcherBuilder {
        DispatcherBuilder::new(transport, credentials)
    }

    /// Wire up the HTTP transport and every component from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let credentials = CredentialPool::new(config.gemini.api_keys.iter().cloned())?;
        let transport = Arc::new(HttpTransport::new(&config.gemini)?);

        Ok(Self::builder(transport, credentials)
            .retry(config.retry_config())
            .cache(config.cache_config())
            .batch(config.batch_config())
            .streaming(config.streaming_config())
            .max_concurrent(config.concurrency.max_concurrent)
            .default_model(&config.gemini.default_model)
            .build())
    }

    /// Run one request in the chosen mode. A batch of one is submitted for
    /// [`ExecutionMode::Batch`]; `options` only apply to unary calls.
    pub async fn dispatch(
        &self,
        request: GenerateRequest,
        mode: ExecutionMode,
        options: RequestOptions,
    ) -> Result<Dispatched> {
        match mode {
            ExecutionMode::Unary => self.generate(request, options).await.map(Dispatched::Response),
            ExecutionMode::Stream => self.stream(request).await.map(Dispatched::Stream),
            ExecutionMode::Batch => self
                .submit_batch(vec![BatchRequest::auto(request)])
                .await
                .map(Dispatched::Batch),
        }
    }

    /// Unary generate with caching and retries.
    pub async fn generate(
        &self,
        request: GenerateRequest,
        options: RequestOptions,
    ) -> Result<GenerateOutcome> {
        self.execute_unary(request, options, None).await
    }

    /// Open a streaming response. The stream is not restartable; calling
    /// again issues a fresh request.
    pub async fn stream(&self, request: GenerateRequest) -> Result<ChunkStream> {
        self.open_stream(request, None).await
    }

    /// Submit requests as one batch job; see [`BatchJobManager`] for polling.
    pub async fn submit_batch(&self, mut requests: Vec<BatchRequest>) -> Result<BatchJob> {
        let started = Instant::now();
        for request in &mut requests {
            self.resolve_model(&mut request.request);
        }

        let result = self.batch.submit_batch(requests).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind().as_str(),
        };
        crate::metrics::record_request(
            ExecutionMode::Batch.as_str(),
            outcome,
            started.elapsed().as_secs_f64(),
        );
        result
    }

    /// Run many unary requests with at most `max_concurrent` in flight.
    /// Results come back in input order.
    pub async fn generate_many(
        &self,
        requests: Vec<GenerateRequest>,
        options: RequestOptions,
    ) -> Vec<Result<GenerateOutcome>> {
        debug!(
            "Dispatching {} requests with concurrency limit {}",
            requests.len(),
            self.limiter.limit()
        );
        self.limiter
            .map_bounded(requests, |request| self.generate(request, options.clone()))
            .await
    }

    /// Pin the next credential and return a handle whose calls all use it.
    pub fn session(&self) -> SessionClient {
        SessionClient::new(self.clone(), self.credentials.pin())
    }

    pub fn batch(&self) -> &BatchJobManager {
        &self.batch
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn credentials(&self) -> &CredentialPool {
        &self.credentials
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub(crate) async fn execute_unary(
        &self,
        mut request: GenerateRequest,
        options: RequestOptions,
        pinned: Option<&Credential>,
    ) -> Result<GenerateOutcome> {
        let started = Instant::now();
        let trace_id = uuid::Uuid::new_v4().simple().to_string();
        self.resolve_model(&mut request);

        let key = (self.cache.is_enabled() && !options.skip_cache)
            .then(|| CacheKey::from_request(&request));

        if let Some(response) = key.as_ref().and_then(|k| self.cache.get(k)) {
            let duration = started.elapsed();
            debug!("Serving {} from cache [{}]", request.model, trace_id);
            crate::metrics::record_request(
                ExecutionMode::Unary.as_str(),
                "cached",
                duration.as_secs_f64(),
            );
            return Ok(GenerateOutcome {
                response,
                metadata: ResponseMetadata {
                    from_cache: true,
                    retry_count: 0,
                    duration,
                    trace_id,
                },
            });
        }

        let call = self.call_with_retry(&request, &trace_id, options.skip_retry, pinned);
        let result = match options.custom_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(GemflowError::Transport(format!(
                    "request exceeded timeout of {:?}",
                    limit
                ))),
            },
            None => call.await,
        };

        let (response, retry_count) = match result
            .and_then(|(response, retries)| reject_blocked(response).map(|r| (r, retries)))
        {
            Ok(ok) => ok,
            Err(e) => {
                warn!("generateContent for {} failed [{}]: {}", request.model, trace_id, e);
                crate::metrics::record_request(
                    ExecutionMode::Unary.as_str(),
                    e.kind().as_str(),
                    started.elapsed().as_secs_f64(),
                );
                return Err(e);
            }
        };

        if let Some(key) = key {
            self.cache.set(key, response.clone());
        }

        let duration = started.elapsed();
        crate::metrics::record_request(
            ExecutionMode::Unary.as_str(),
            "success",
            duration.as_secs_f64(),
        );
        debug!(
            "generateContent for {} completed in {:?} with {} retries [{}]",
            request.model, duration, retry_count, trace_id
        );

        Ok(GenerateOutcome {
            response,
            metadata: ResponseMetadata {
                from_cache: false,
                retry_count,
                duration,
                trace_id,
            },
        })
    }

    pub(crate) async fn open_stream(
        &self,
        mut request: GenerateRequest,
        pinned: Option<&Credential>,
    ) -> Result<ChunkStream> {
        let started = Instant::now();
        self.resolve_model(&mut request);
        let credential = pinned.cloned().unwrap_or_else(|| self.credentials.next());

        match self.transport.stream(&credential, &request).await {
            Ok(body) => {
                crate::metrics::record_request(
                    ExecutionMode::Stream.as_str(),
                    "success",
                    started.elapsed().as_secs_f64(),
                );
                debug!("Opened stream for {} using key {}", request.model, credential);
                Ok(ChunkStream::spawn(body, &self.streaming))
            }
            Err(e) => {
                crate::metrics::record_request(
                    ExecutionMode::Stream.as_str(),
                    e.kind().as_str(),
                    started.elapsed().as_secs_f64(),
                );
                Err(e)
            }
        }
    }

    async fn call_with_retry(
        &self,
        request: &GenerateRequest,
        trace_id: &str,
        skip_retry: bool,
        pinned: Option<&Credential>,
    ) -> Result<(GenerateContentResponse, u32)> {
        let single_attempt;
        let executor = if skip_retry {
            single_attempt = RetryExecutor::new(RetryConfig::no_retry());
            &single_attempt
        } else {
            &self.retry
        };

        let outcome = executor
            .execute("generateContent", move || {
                let credential = pinned.cloned().unwrap_or_else(|| self.credentials.next());
                async move {
                    self.transport
                        .generate(&credential, request, trace_id)
                        .await
                }
            })
            .await;

        let retries = outcome.retry_count();
        outcome.into_result().map(|response| (response, retries))
    }

    fn resolve_model(&self, request: &mut GenerateRequest) {
        if request.model.trim().is_empty() {
            request.model = self.default_model.clone();
        }
    }
}

/// Content-policy rejections are terminal: never retried, never cached.
fn reject_blocked(response: GenerateContentResponse) -> Result<GenerateContentResponse> {
    match response.blocked_reason() {
        Some(reason) => Err(GemflowError::SafetyFilterBlocked(reason)),
        None => Ok(response),
    }
}

/// Builder for [`RequestDispatcher`] with defaults for every component.
pub struct DispatcherBuilder {
    transport: Arc<dyn Transport>,
    credentials: CredentialPool,
    retry: RetryConfig,
    cache: CacheConfig,
    batch: BatchConfig,
    streaming: StreamingConfig,
    max_concurrent: usize,
    default_model: String,
}

impl DispatcherBuilder {
    fn new(transport: Arc<dyn Transport>, credentials: CredentialPool) -> Self {
        Self {
            transport,
            credentials,
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            batch: BatchConfig::default(),
            streaming: StreamingConfig::default(),
            max_concurrent: num_cpus::get(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn batch(mut self, config: BatchConfig) -> Self {
        self.batch = config;
        self
    }

    pub fn streaming(mut self, config: StreamingConfig) -> Self {
        self.streaming = config;
        self
    }

    pub fn max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent = limit;
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn build(self) -> RequestDispatcher {
        info!(
            "Request dispatcher ready: {} key(s), cache {}, max {} in flight",
            self.credentials.len(),
            if self.cache.enabled { "on" } else { "off" },
            self.max_concurrent.max(1)
        );

        let batch =
            BatchJobManager::new(self.transport.clone(), self.credentials.clone(), self.batch);
        RequestDispatcher {
            credentials: self.credentials,
            transport: self.transport,
            cache: ResponseCache::new(self.cache),
            retry: RetryExecutor::new(self.retry),
            limiter: ConcurrencyLimiter::new(self.max_concurrent),
            streaming: self.streaming,
            batch,
            default_model: self.default_model,
        }
    }
}
