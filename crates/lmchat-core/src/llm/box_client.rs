//! BoxCompletionClient -- object-safe dynamic dispatch wrapper for CompletionClient.
//!
//! 1. Define an object-safe `CompletionClientDyn` trait with boxed futures
//! 2. Blanket-impl `CompletionClientDyn` for all `T: CompletionClient`
//! 3. `BoxCompletionClient` wraps `Box<dyn CompletionClientDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use lmchat_types::llm::{CompletionRequest, LlmError, ModelInfo};

use super::client::{ByteStream, CompletionClient};

/// Object-safe version of [`CompletionClient`] with boxed futures.
pub trait CompletionClientDyn: Send + Sync {
    fn name(&self) -> &str;

    fn open_stream_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, LlmError>> + Send + 'a>>;

    fn list_models_boxed(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ModelInfo>, LlmError>> + Send + '_>>;
}

impl<T: CompletionClient> CompletionClientDyn for T {
    fn name(&self) -> &str {
        CompletionClient::name(self)
    }

    fn open_stream_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, LlmError>> + Send + 'a>> {
        Box::pin(self.open_stream(request))
    }

    fn list_models_boxed(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ModelInfo>, LlmError>> + Send + '_>> {
        Box::pin(self.list_models())
    }
}

/// Type-erased completion client for runtime backend selection.
///
/// Since `CompletionClient` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxCompletionClient` provides equivalent methods that delegate
/// to the inner `CompletionClientDyn` trait object.
pub struct BoxCompletionClient {
    inner: Box<dyn CompletionClientDyn + Send + Sync>,
}

impl BoxCompletionClient {
    pub fn new<T: CompletionClient + 'static>(client: T) -> Self {
        Self {
            inner: Box::new(client),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn open_stream(&self, request: &CompletionRequest) -> Result<ByteStream, LlmError> {
        self.inner.open_stream_boxed(request).await
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        self.inner.list_models_boxed().await
    }
}

impl std::fmt::Debug for BoxCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxCompletionClient")
            .field("name", &self.name())
            .finish()
    }
}
