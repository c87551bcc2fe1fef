//! Server-sent-event chunk decoder.
//!
//! The model service streams lines of the form:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//! data: [DONE]
//! ```
//!
//! Fragments arrive with arbitrary boundaries, so raw bytes are buffered and
//! only complete (newline-terminated) lines are parsed. One decoder serves one
//! response; it is not reusable across sessions.

use serde::Deserialize;

use lmchat_types::llm::StreamEvent;

/// Payload that ends the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Longest unterminated line kept in the buffer. Large enough for an inline
/// base64 image delta.
pub const MAX_LINE_BYTES: usize = 32 * 1024 * 1024;

/// Bytes of an oversized line kept in its `Malformed` event.
const OVERSIZED_PREVIEW_BYTES: usize = 256;

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

/// Incremental decoder from raw response bytes to [`StreamEvent`]s.
#[derive(Debug)]
pub struct ChunkDecoder {
    buffer: Vec<u8>,
    done: bool,
    max_line: usize,
    /// Dropping the tail of an oversized line until its newline arrives.
    discarding: bool,
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that gives up on lines longer than `max_line` bytes.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            done: false,
            max_line,
            discarding: false,
        }
    }

    /// Whether the terminator has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one fragment and return the events for every line it completed.
    pub fn push(&mut self, fragment: &[u8]) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(fragment);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            self.decode_line(&line[..pos], &mut events);
            if self.done {
                self.buffer.clear();
                return events;
            }
        }

        if self.discarding {
            self.buffer.clear();
        } else if self.buffer.len() > self.max_line {
            self.drop_oversized_line(&mut events);
        }
        events
    }

    /// Flush at natural end-of-stream, decoding an unterminated trailing line.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.done || self.discarding || self.buffer.is_empty() {
            self.discarding = false;
            self.buffer.clear();
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        self.decode_line(&line, &mut events);
        events
    }

    fn drop_oversized_line(&mut self, events: &mut Vec<StreamEvent>) {
        let preview = &self.buffer[..self.buffer.len().min(OVERSIZED_PREVIEW_BYTES)];
        let raw = String::from_utf8_lossy(preview).into_owned();
        tracing::warn!(
            bytes = self.buffer.len(),
            limit = self.max_line,
            "stream line exceeds length limit, discarding it"
        );
        events.push(StreamEvent::Malformed { raw });
        self.buffer.clear();
        self.discarding = true;
    }

    fn decode_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() {
            return;
        }

        let Some(payload) = data_payload(line) else {
            if !is_ignored_field(line) {
                tracing::warn!(line = %line, "unexpected line in completion stream");
                events.push(StreamEvent::Malformed {
                    raw: line.to_string(),
                });
            }
            return;
        };

        if payload == DONE_SENTINEL {
            self.done = true;
            events.push(StreamEvent::Done);
            return;
        }

        match serde_json::from_str::<ChunkPayload>(payload) {
            Ok(chunk) => match chunk.choices.into_iter().next() {
                Some(choice) => {
                    let ChunkDelta { content, image } = choice.delta;
                    if let Some(text) = content.filter(|t| !t.is_empty()) {
                        events.push(StreamEvent::DeltaText { text });
                    }
                    if let Some(uri) = image.filter(|u| !u.is_empty()) {
                        events.push(StreamEvent::DeltaImage { uri });
                    }
                }
                None => {
                    tracing::warn!(payload = %payload, "stream chunk has no choices");
                    events.push(StreamEvent::Malformed {
                        raw: payload.to_string(),
                    });
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, payload = %payload, "failed to decode stream chunk");
                events.push(StreamEvent::Malformed {
                    raw: payload.to_string(),
                });
            }
        }
    }
}

/// Strip the `data:` field name (with or without a following space).
fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|rest| rest.strip_prefix(' ').unwrap_or(rest).trim())
}

/// SSE comments and fields other than `data` carry nothing for us.
fn is_ignored_field(line: &str) -> bool {
    line.starts_with(':')
        || line.starts_with("event:")
        || line.starts_with("id:")
        || line.starts_with("retry:")
}
