// Cancellable, back-pressured chunk stream over an SSE byte stream
// Author: kelexine (https://github.com/kelexine)

use super::chunk::{StreamingAccumulator, StreamingChunk};
use super::decoder::{SseDecoder, SseEvent};
use super::StreamingConfig;
use crate::error::{extract_error_message, GemflowError, Result};
use crate::models::GenerateContentResponse;
use crate::transport::ByteStream;
use crate::utils::logging::sanitize;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Chunks buffered between the reader task and the consumer.
const CHANNEL_CAPACITY: usize = 16;

/// Result of interpreting one SSE event.
#[derive(Debug)]
pub(crate) enum EventOutcome {
    /// The `[DONE]` sentinel.
    Done,
    Response(Box<GenerateContentResponse>),
    /// Server-reported error delivered in-band; ends the stream.
    Error(GemflowError),
    /// Malformed or irrelevant event; already logged.
    Skip,
}

/// Decode one event: sentinel check first, then structured JSON decode.
pub(crate) fn parse_event(event: &SseEvent) -> EventOutcome {
    if event.is_done() {
        debug!("Received DONE marker");
        return EventOutcome::Done;
    }

    let data = event.data.trim();
    if data.is_empty() {
        return EventOutcome::Skip;
    }

    let parsed: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            warn!("Skipping malformed SSE event: {}", e);
            debug!("Raw data: {}", data.chars().take(200).collect::<String>());
            crate::metrics::record_stream_event_skipped();
            return EventOutcome::Skip;
        }
    };

    if let Some(error) = parsed.get("error").filter(|e| e.is_object()) {
        let code = error
            .get("code")
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(500);
        let message = extract_error_message(data).unwrap_or_else(|| "unknown error".to_string());
        warn!("Stream carried an error event ({}): {}", code, sanitize(&message));
        return EventOutcome::Error(GemflowError::from_status(code, data.to_string()));
    }

    // Some deployments wrap each payload in a {"response": {...}} envelope.
    let response_data = match parsed.get("response") {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => parsed,
    };

    match serde_json::from_value::<GenerateContentResponse>(response_data) {
        Ok(response) => EventOutcome::Response(Box::new(response)),
        Err(e) => {
            warn!("Skipping SSE event with unexpected shape: {}", e);
            crate::metrics::record_stream_event_skipped();
            EventOutcome::Skip
        }
    }
}

/// Turn raw bytes into SSE events, flushing any unterminated trailing event.
fn sse_events(
    mut byte_stream: ByteStream,
    buffer_size: usize,
) -> impl Stream<Item = Result<SseEvent>> + Send {
    async_stream::stream! {
        let mut decoder = SseDecoder::with_capacity(buffer_size);

        while let Some(chunk_result) = byte_stream.next().await {
            match chunk_result {
                Ok(chunk) => {
                    for event in decoder.push(&chunk) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    warn!("Stream error: {}", e);
                    yield Err(e);
                    return;
                }
            }
        }

        if let Some(event) = decoder.finish() {
            debug!("Processing event left in buffer at end of stream");
            yield Ok(event);
        }
    }
}

/// Consumer side of a streaming response.
///
/// Chunks arrive in wire order with strictly increasing `index`, the last
/// one having `is_complete == true`. Dropping the stream aborts the reader
/// task, which drops the underlying connection. Not restartable.
pub struct ChunkStream {
    receiver: mpsc::Receiver<Result<StreamingChunk>>,
    reader: JoinHandle<()>,
}

impl ChunkStream {
    /// Spawn a reader task decoding `byte_stream` into chunks.
    pub fn spawn(byte_stream: ByteStream, config: &StreamingConfig) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let chunk_timeout = config.chunk_timeout;
        let events = sse_events(byte_stream, config.buffer_size);

        let reader = tokio::spawn(async move {
            futures::pin_mut!(events);
            let mut index = 0usize;

            loop {
                let next = match tokio::time::timeout(chunk_timeout, events.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!("No stream data within {:?}", chunk_timeout);
                        let _ = sender.send(Err(GemflowError::StreamTimeout(chunk_timeout))).await;
                        return;
                    }
                };

                let event = match next {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => {
                        let _ = sender.send(Err(e)).await;
                        return;
                    }
                    None => break,
                };

                match parse_event(&event) {
                    EventOutcome::Skip => continue,
                    EventOutcome::Done => break,
                    EventOutcome::Error(e) => {
                        let _ = sender.send(Err(e)).await;
                        return;
                    }
                    EventOutcome::Response(response) => {
                        let blocked = response
                            .prompt_feedback
                            .as_ref()
                            .and_then(|f| f.block_reason.clone());
                        if let Some(reason) = blocked {
                            let error = GemflowError::SafetyFilterBlocked(format!(
                                "prompt blocked: {}",
                                reason
                            ));
                            let _ = sender.send(Err(error)).await;
                            return;
                        }

                        let chunk = StreamingChunk::from_response(&response, index);
                        let complete = chunk.is_complete;
                        index += 1;
                        crate::metrics::record_stream_chunk();

                        if sender.send(Ok(chunk)).await.is_err() {
                            debug!("Stream consumer went away; closing connection");
                            return;
                        }
                        if complete {
                            debug!("Gemini SSE stream completed after {} chunk(s)", index);
                            return;
                        }
                    }
                }
            }

            // Ended by [DONE] or end of body without a finish reason.
            let _ = sender.send(Ok(StreamingChunk::terminal(index))).await;
            debug!("Gemini SSE stream ended after {} chunk(s)", index + 1);
        });

        Self { receiver, reader }
    }

    /// Drain the stream into an accumulator.
    ///
    /// Fails on the first stream error; chunks already received are lost.
    pub async fn accumulate(mut self) -> Result<StreamingAccumulator> {
        let mut accumulator = StreamingAccumulator::new();
        while let Some(chunk) = self.next().await {
            accumulator.push(chunk?)?;
        }
        Ok(accumulator)
    }

    /// Stop reading and release the connection now.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Stream for ChunkStream {
    type Item = Result<StreamingChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
