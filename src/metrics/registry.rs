// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, HistogramVec, Opts, Registry, TextEncoder,
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // REQUEST METRICS
    // ============================================================================

    /// Requests handled by the dispatcher
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec_with_registry!(
        Opts::new("gemflow_requests_total", "Total requests handled by the dispatcher"),
        // mode: unary, stream, batch; outcome: success, cached, or an error kind
        &["mode", "outcome"],
        REGISTRY
    ).unwrap();

    /// End-to-end request duration, including retries
    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new(
            "gemflow_request_duration_seconds",
            "Request duration in seconds"
        )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["mode"],
        REGISTRY
    ).unwrap();

    /// Retries performed after a failed attempt
    pub static ref RETRY_ATTEMPTS: Counter = register_counter_with_registry!(
        Opts::new("gemflow_retry_attempts_total", "Total retries after failed attempts"),
        REGISTRY
    ).unwrap();

    /// Credentials handed out by the pool
    pub static ref CREDENTIAL_ROTATIONS: Counter = register_counter_with_registry!(
        Opts::new("gemflow_credential_rotations_total", "Total credential rotations"),
        REGISTRY
    ).unwrap();

    // ============================================================================
    // CACHE METRICS
    // ============================================================================

    /// Cache operations
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("gemflow_cache_operations_total", "Total response cache operations"),
        &["operation"], // operation: hit, miss, insert, evict, expire
        REGISTRY
    ).unwrap();

    // ============================================================================
    // STREAMING METRICS
    // ============================================================================

    /// Chunks delivered to stream consumers
    pub static ref STREAM_CHUNKS: Counter = register_counter_with_registry!(
        Opts::new("gemflow_stream_chunks_total", "Total streaming chunks delivered"),
        REGISTRY
    ).unwrap();

    /// SSE events dropped as malformed
    pub static ref STREAM_EVENTS_SKIPPED: Counter = register_counter_with_registry!(
        Opts::new("gemflow_stream_events_skipped_total", "Total malformed SSE events skipped"),
        REGISTRY
    ).unwrap();

    // ============================================================================
    // BATCH METRICS
    // ============================================================================

    /// Batch status checks
    pub static ref BATCH_POLLS: Counter = register_counter_with_registry!(
        Opts::new("gemflow_batch_polls_total", "Total batch status checks"),
        REGISTRY
    ).unwrap();

    /// Batch job lifecycle events
    pub static ref BATCH_JOBS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("gemflow_batch_jobs_total", "Total batch job lifecycle events"),
        &["status"], // status: submitted, succeeded, failed, cancelled
        REGISTRY
    ).unwrap();
}

/// Force every collector into the registry so unused ones report zero
fn ensure_registered() {
    lazy_static::initialize(&REQUESTS_TOTAL);
    lazy_static::initialize(&REQUEST_DURATION);
    lazy_static::initialize(&RETRY_ATTEMPTS);
    lazy_static::initialize(&CREDENTIAL_ROTATIONS);
    lazy_static::initialize(&CACHE_OPERATIONS);
    lazy_static::initialize(&STREAM_CHUNKS);
    lazy_static::initialize(&STREAM_EVENTS_SKIPPED);
    lazy_static::initialize(&BATCH_POLLS);
    lazy_static::initialize(&BATCH_JOBS);
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    ensure_registered();
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
