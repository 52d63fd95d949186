// Incremental Server-Sent Events decoder
// Author: kelexine (https://github.com/kelexine)

use tracing::trace;

/// Literal `data:` payload that terminates a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One complete SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if present.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
    /// Value of the `id:` field, if present.
    pub id: Option<String>,
}

impl SseEvent {
    pub fn is_done(&self) -> bool {
        self.data.trim() == DONE_SENTINEL
    }
}

/// Buffers bytes until whole events are available.
///
/// Works on raw bytes so that a multi-byte UTF-8 sequence or a line
/// terminator split across two reads decodes identically to the unsplit
/// input. Lines end in `\n` or `\r\n`; a blank line ends an event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending: PendingEvent,
    last_event_id: Option<String>,
}

#[derive(Debug, Default)]
struct PendingEvent {
    event: Option<String>,
    data_lines: Vec<String>,
    id: Option<String>,
}

impl PendingEvent {
    fn take(&mut self) -> Option<SseEvent> {
        let pending = std::mem::take(self);
        // Per SSE, an event without data lines is not dispatched.
        if pending.data_lines.is_empty() {
            return None;
        }
        Some(SseEvent {
            event: pending.event,
            data: pending.data_lines.join("\n"),
            id: pending.id,
        })
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Feed bytes; returns every event completed by them, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|&b| b == b'\n') {
            let line_end = consumed + offset;
            let mut line = &self.buffer[consumed..line_end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            consumed = line_end + 1;

            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        self.buffer.drain(..consumed);

        events
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            let line = line.trim_end_matches('\r').to_string();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.pending.take()
    }

    /// Bytes received but not yet part of a complete line.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Most recent `id:` seen on the stream.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.pending.take();
        }
        if line.starts_with(':') {
            trace!("Ignoring SSE comment line");
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending.event = Some(value.to_string()),
            "data" => self.pending.data_lines.push(value.to_string()),
            "id" => {
                self.pending.id = Some(value.to_string());
                self.last_event_id = Some(value.to_string());
            }
            other => trace!("Ignoring unknown SSE field: {}", other),
        }
        None
    }
}
