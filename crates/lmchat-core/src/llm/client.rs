//! CompletionClient trait definition.
//!
//! This is the port through which the core reaches the model service.
//! Uses RPITIT for `open_stream` and `list_models`. The body is handed back
//! as raw bytes: framing and decoding belong to the core, not the adapter.

use std::pin::Pin;

use futures_util::Stream;

use lmchat_types::llm::{CompletionRequest, LlmError, ModelInfo};

/// Raw response body, chunked as it arrives over the connection.
///
/// Dropping the stream closes the underlying connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, LlmError>> + Send + 'static>>;

/// Trait for model-service backends (LM Studio, OpenAI, test fakes).
///
/// Implementations live in lmchat-infra (e.g., `OpenAiCompatibleClient`).
pub trait CompletionClient: Send + Sync {
    /// Human-readable backend name (e.g., "lm-studio", "openai").
    fn name(&self) -> &str;

    /// Issue a streaming completion request.
    ///
    /// Resolves once the response headers have arrived. A non-success status
    /// resolves to `LlmError::RequestFailed` carrying the server's message.
    fn open_stream(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<ByteStream, LlmError>> + Send;

    /// List the models the service can serve.
    fn list_models(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ModelInfo>, LlmError>> + Send;
}
