//! OpenAI-compatible completion client.
//!
//! A single [`OpenAiCompatibleClient`] serves LM Studio, OpenAI, Ollama, and
//! any other server that speaks the chat completions protocol, selected by
//! base URL. The response body is returned as raw bytes; SSE decoding is
//! done by `lmchat_core::stream::ChunkDecoder`.

pub mod config;
pub mod types;

use std::time::Duration;

use futures_util::TryStreamExt;
use secrecy::{ExposeSecret, SecretString};

use lmchat_core::llm::{ByteStream, CompletionClient};
use lmchat_types::llm::{CompletionRequest, LlmError, ModelInfo};

use self::config::OpenAiCompatConfig;
use self::types::{ChatCompletionBody, ErrorBody, ModelList};

/// Client for any OpenAI-compatible API.
///
/// # API Key Security
///
/// The optional API key is stored as a [`SecretString`] and is only exposed
/// when building the `Authorization` header. The type does not implement
/// `Debug`.
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    name: String,
    base_url: String,
    api_key: Option<SecretString>,
}

impl OpenAiCompatibleClient {
    /// Create a new client from a configuration.
    ///
    /// Only the connect phase is timed out: a streamed answer may legitimately
    /// take minutes.
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            name: config.name,
            base_url: config.base_url,
            api_key: config.api_key,
        })
    }

    /// LM Studio on `http://localhost:1234/v1`.
    pub fn lm_studio() -> Result<Self, LlmError> {
        Self::new(config::lm_studio_defaults())
    }

    /// OpenAI on `https://api.openai.com/v1`.
    pub fn openai(api_key: SecretString) -> Result<Self, LlmError> {
        Self::new(config::openai_defaults(api_key))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

/// Turn a non-success response into `RequestFailed`, preferring the
/// server's `error.message`.
async fn error_from_response(response: reqwest::Response) -> LlmError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    LlmError::RequestFailed {
        status: status.as_u16(),
        message,
    }
}

impl CompletionClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(
        name = "chat_completions",
        skip_all,
        fields(backend = %self.name, model = %request.model, max_tokens = request.max_tokens)
    )]
    async fn open_stream(&self, request: &CompletionRequest) -> Result<ByteStream, LlmError> {
        let body = ChatCompletionBody::from(request);
        let url = self.url("chat/completions");

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let err = error_from_response(response).await;
            tracing::warn!(status = status.as_u16(), error = %err, "completion request rejected");
            return Err(err);
        }
        tracing::debug!(status = status.as_u16(), "completion stream opened");

        let stream = response
            .bytes_stream()
            .map_ok(|bytes| bytes.to_vec())
            .map_err(|e| LlmError::StreamRead(e.to_string()));
        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let url = self.url("models");
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| LlmError::Network(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse model list: {e}")))?;
        Ok(list.data.into_iter().map(ModelInfo::from).collect())
    }
}
