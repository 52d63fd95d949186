// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics,
    BATCH_JOBS,
    BATCH_POLLS,
    CACHE_OPERATIONS,
    CREDENTIAL_ROTATIONS,
    REQUESTS_TOTAL,
    REQUEST_DURATION,
    RETRY_ATTEMPTS,
    STREAM_CHUNKS,
    STREAM_EVENTS_SKIPPED,
};

/// Helper to record a finished dispatcher request
pub fn record_request(mode: &str, outcome: &str, duration_secs: f64) {
    REQUESTS_TOTAL.with_label_values(&[mode, outcome]).inc();
    REQUEST_DURATION.with_label_values(&[mode]).observe(duration_secs);
}

pub fn record_retry_attempt() {
    RETRY_ATTEMPTS.inc();
}

pub fn record_credential_rotation() {
    CREDENTIAL_ROTATIONS.inc();
}

/// Helper to record response cache operations
pub fn record_cache_operation(operation: &str) {
    CACHE_OPERATIONS.with_label_values(&[operation]).inc();
}

/// Helper to record streaming events
pub fn record_stream_chunk() {
    STREAM_CHUNKS.inc();
}

pub fn record_stream_event_skipped() {
    STREAM_EVENTS_SKIPPED.inc();
}

/// Helper to record batch activity
pub fn record_batch_poll() {
    BATCH_POLLS.inc();
}

pub fn record_batch_job(status: &str) {
    BATCH_JOBS.with_label_values(&[status]).inc();
}
