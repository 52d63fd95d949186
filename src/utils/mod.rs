//! Utility functions and helpers for gemflow.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization and API key redaction.
//! - `retry`: Retry executor with exponential backoff that respects
//!   upstream `RetryInfo` hints.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod logging;
pub mod retry;
