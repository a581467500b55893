//! Incremental decoder for Server-Sent Events bodies.
//!
//! Network chunks do not respect line or UTF-8 boundaries, so bytes are buffered
//! until a full line is available.
//!
//! ```text
//! event: response.output_text.delta
//! data: {"type":"response.output_text.delta","delta":"Hello"}
//!
//! data: [DONE]
//! ```

use serde_json::Value;

use crate::error::{RephraseError, Result};

/// SSE event types
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// Data event with JSON payload
    Data(Value),
    /// Stream complete marker
    Done,
    /// Comment or keep-alive
    Comment(String),
    /// Error event or undecodable payload
    Error(String),
}

/// Longest unterminated line the decoder buffers before failing the stream.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Line-buffering SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline
    scanned: usize,
}

impl SseDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk and return every event completed by it.
    ///
    /// Fails once a single line grows past [`MAX_LINE_BYTES`].
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let line = std::str::from_utf8(&self.buffer[start..=end])
                .map_err(|e| RephraseError::Upstream(format!("Invalid UTF-8 in stream: {e}")))?;
            if let Some(event) = parse_sse_line(line) {
                events.push(event);
            }
            start = end + 1;
            self.scanned = start;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > MAX_LINE_BYTES {
            self.buffer.clear();
            self.scanned = 0;
            return Err(RephraseError::Upstream(format!(
                "Stream line exceeds {MAX_LINE_BYTES} bytes"
            )));
        }

        Ok(events)
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Result<Option<SseEvent>> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8(rest)
            .map_err(|e| RephraseError::Upstream(format!("Invalid UTF-8 in stream: {e}")))?;
        Ok(parse_sse_line(&line))
    }
}

/// Parse one SSE line. Field lines other than `data:` and `error:` are ignored.
pub fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let line = line.trim();

    if line.is_empty() {
        return None;
    }

    if let Some(comment) = line.strip_prefix(':') {
        return Some(SseEvent::Comment(comment.trim().to_string()));
    }

    if let Some(data) = line.strip_prefix("data:") {
        let data = data.trim_start();
        if data == "[DONE]" {
            return Some(SseEvent::Done);
        }

        return match serde_json::from_str(data) {
            Ok(json) => Some(SseEvent::Data(json)),
            Err(_) => Some(SseEvent::Error(format!("Invalid JSON: {data}"))),
        };
    }

    line.strip_prefix("error:")
        .map(|error| SseEvent::Error(error.trim().to_string()))
}
