// Streaming chunks and their accumulation into one response
// Author: kelexine (https://github.com/kelexine)

use crate::error::{GemflowError, Result};
use crate::models::{FinishReason, GenerateContentResponse, SafetyRating, UsageMetadata};

/// One increment of a streaming response.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingChunk {
    /// Text produced by this increment, if any.
    pub text: Option<String>,
    /// True only on the final chunk of the stream.
    pub is_complete: bool,
    pub finish_reason: Option<FinishReason>,
    /// Position in the stream, starting at 0.
    pub index: usize,
    pub safety_ratings: Vec<SafetyRating>,
    /// Token usage, usually present on the final chunk.
    pub usage_metadata: Option<UsageMetadata>,
}

impl StreamingChunk {
    /// Build a chunk from one decoded SSE payload.
    ///
    /// A present finish reason marks the chunk as the last one.
    pub fn from_response(response: &GenerateContentResponse, index: usize) -> Self {
        let text = response.text();
        let finish_reason = response.finish_reason();
        Self {
            text: if text.is_empty() { None } else { Some(text) },
            is_complete: finish_reason.is_some(),
            finish_reason,
            index,
            safety_ratings: response.safety_ratings(),
            usage_metadata: response.usage_metadata.clone(),
        }
    }

    /// Terminal chunk with no content, emitted when the stream ends without
    /// a finish reason.
    pub fn terminal(index: usize) -> Self {
        Self {
            text: None,
            is_complete: true,
            finish_reason: None,
            index,
            safety_ratings: Vec::new(),
            usage_metadata: None,
        }
    }
}

/// Fold of a chunk sequence into one logical response.
#[derive(Debug, Clone, Default)]
pub struct StreamingAccumulator {
    full_text: String,
    chunks: Vec<StreamingChunk>,
    is_complete: bool,
    finish_reason: Option<FinishReason>,
    usage_metadata: Option<UsageMetadata>,
}

impl StreamingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next chunk.
    ///
    /// Rejects chunks that arrive out of order, repeat an index, or follow
    /// the completing chunk, so `full_text` never has gaps or duplicates.
    pub fn push(&mut self, chunk: StreamingChunk) -> Result<()> {
        if self.is_complete {
            return Err(GemflowError::Decoding(format!(
                "chunk {} arrived after stream completion",
                chunk.index
            )));
        }
        if let Some(last) = self.chunks.last() {
            if chunk.index <= last.index {
                return Err(GemflowError::Decoding(format!(
                    "chunk {} arrived after chunk {}",
                    chunk.index, last.index
                )));
            }
        }

        if let Some(text) = &chunk.text {
            self.full_text.push_str(text);
        }
        if chunk.finish_reason.is_some() {
            self.finish_reason = chunk.finish_reason;
        }
        if chunk.usage_metadata.is_some() {
            self.usage_metadata = chunk.usage_metadata.clone();
        }
        self.is_complete = chunk.is_complete;
        self.chunks.push(chunk);
        Ok(())
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn chunks(&self) -> &[StreamingChunk] {
        &self.chunks
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn usage_metadata(&self) -> Option<&UsageMetadata> {
        self.usage_metadata.as_ref()
    }
}
