use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository operations (used by the `ChatStore` port in lmchat-core).
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from loading or validating configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("invalid budget: {0}")]
    InvalidBudget(String),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Errors surfaced by a chat exchange.
///
/// Malformed chunks are deliberately absent: they are counted and logged,
/// never propagated.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    #[error("conversation is empty, nothing to send")]
    EmptyConversation,

    #[error("message has no text and no image")]
    EmptyInput,

    #[error("no chat selected")]
    NoChatSelected,

    #[error("a response is already streaming for this conversation")]
    SessionBusy,

    /// Non-success status or network failure before any bytes streamed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The connection dropped mid-stream. Partial output is kept by the caller.
    #[error("stream read failed: {0}")]
    StreamReadFailed(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),
}

impl ChatError {
    /// Classify a model-service error by whether streaming had begun.
    pub fn from_llm(err: LlmError, streaming: bool) -> Self {
        match err {
            LlmError::RequestFailed { message, .. } if !streaming => ChatError::RequestFailed(message),
            LlmError::StreamRead(msg) => ChatError::StreamReadFailed(msg),
            other if streaming => ChatError::StreamReadFailed(other.to_string()),
            other => ChatError::RequestFailed(other.to_string()),
        }
    }
}
