// SSE streaming: decoding, chunking and accumulation
// Author: kelexine (https://github.com/kelexine)

mod chunk;
pub mod decoder;
mod stream;

pub use chunk::{StreamingAccumulator, StreamingChunk};
pub use decoder::{SseDecoder, SseEvent, DONE_SENTINEL};
pub use stream::ChunkStream;

use std::time::Duration;
use tracing::warn;

/// Smallest accepted decoder buffer, in bytes.
pub const MIN_BUFFER_SIZE: usize = 1024;
/// Shortest accepted wait for the next piece of stream data.
pub const MIN_CHUNK_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning for streaming responses.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingConfig {
    /// Initial decoder buffer capacity in bytes (>= 1024).
    pub buffer_size: usize,
    /// Maximum wait for the next piece of data before failing the stream (>= 5s).
    pub chunk_timeout: Duration,
}

impl StreamingConfig {
    /// Build a config, raising out-of-range values to their minimum.
    pub fn new(buffer_size: usize, chunk_timeout: Duration) -> Self {
        let buffer_size = if buffer_size < MIN_BUFFER_SIZE {
            warn!(
                "Streaming buffer size {} below minimum; using {}",
                buffer_size, MIN_BUFFER_SIZE
            );
            MIN_BUFFER_SIZE
        } else {
            buffer_size
        };

        let chunk_timeout = if chunk_timeout < MIN_CHUNK_TIMEOUT {
            warn!(
                "Chunk timeout {:?} below minimum; using {:?}",
                chunk_timeout, MIN_CHUNK_TIMEOUT
            );
            MIN_CHUNK_TIMEOUT
        } else {
            chunk_timeout
        };

        Self {
            buffer_size,
            chunk_timeout,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            buffer_size: 8192,
            chunk_timeout: Duration::from_secs(30),
        }
    }
}
