// gemflow - Gemini API request orchestration
// Author: kelexine (https://github.com/kelexine)

pub mod batch;
pub mod cache;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod models;
pub mod streaming;
pub mod transport;
pub mod utils;

pub use dispatcher::{RequestDispatcher, RequestOptions};
pub use error::{GemflowError, Result};
