//! Completion protocol types for lmchat.
//!
//! These types model the data shapes for model-service interactions:
//! the token budget, the outbound completion request, decoded stream events,
//! model listings, and error handling.

use serde::{Deserialize, Serialize};

use crate::chat::Message;
use crate::error::ConfigError;

/// Token limits applied to a single exchange.
///
/// Invariant: `max_response_tokens <= max_total_tokens`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// Ceiling on the estimated cost of the history sent as context.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u32,
    /// Ceiling on context plus response.
    #[serde(default = "default_max_total_tokens")]
    pub max_total_tokens: u32,
    /// Ceiling on the `max_tokens` requested for the response.
    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: u32,
}

fn default_max_context_tokens() -> u32 {
    4096
}

fn default_max_total_tokens() -> u32 {
    32768
}

fn default_max_response_tokens() -> u32 {
    4096
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            max_total_tokens: default_max_total_tokens(),
            max_response_tokens: default_max_response_tokens(),
        }
    }
}

impl Budget {
    /// Build a budget, rejecting one whose response ceiling exceeds the total.
    pub fn new(
        max_context_tokens: u32,
        max_total_tokens: u32,
        max_response_tokens: u32,
    ) -> Result<Self, ConfigError> {
        let budget = Self {
            max_context_tokens,
            max_total_tokens,
            max_response_tokens,
        };
        budget.validate()?;
        Ok(budget)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_response_tokens > self.max_total_tokens {
            return Err(ConfigError::InvalidBudget(format!(
                "max_response_tokens ({}) exceeds max_total_tokens ({})",
                self.max_response_tokens, self.max_total_tokens
            )));
        }
        Ok(())
    }
}

/// Request to the model service for a streamed completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(default)]
    pub stream: bool,
}

/// One decoded unit of the response stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// A fragment of assistant text, in arrival order.
    DeltaText { text: String },

    /// An image reference attached to the assistant message.
    DeltaImage { uri: String },

    /// The terminator was seen; nothing further is decoded.
    Done,

    /// A line whose payload could not be decoded. Never fatal.
    Malformed { raw: String },
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        StreamEvent::DeltaText { text: text.into() }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }
}

/// A model offered by the model service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
}

/// Errors from model-service operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Non-success HTTP status. `message` comes from the error body when present.
    #[error("request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The body stream broke after it had started.
    #[error("stream read error: {0}")]
    StreamRead(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
