//! Scripted in-memory `CompletionClient` for session and controller tests.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;

use lmchat_types::llm::{CompletionRequest, LlmError, ModelInfo};

use super::client::{ByteStream, CompletionClient};

/// What the fake does when a stream is opened.
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit the fragments, then end naturally.
    Chunks(Vec<String>),
    /// Emit the fragments, then never yield again.
    ChunksThenHang(Vec<String>),
    /// Emit the fragments, then fail the read.
    ChunksThenError(Vec<String>, &'static str),
    /// Fail before any byte arrives.
    Reject { status: u16, message: &'static str },
}

pub struct FakeClient {
    script: Script,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeClient {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

fn bytes(fragments: &[String]) -> Vec<Result<Vec<u8>, LlmError>> {
    fragments.iter().map(|f| Ok(f.as_bytes().to_vec())).collect()
}

impl CompletionClient for FakeClient {
    fn name(&self) -> &str {
        "fake"
    }

    async fn open_stream(&self, request: &CompletionRequest) -> Result<ByteStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.script {
            Script::Chunks(f) => Ok(Box::pin(futures_util::stream::iter(bytes(f)))),
            Script::ChunksThenHang(f) => Ok(Box::pin(
                futures_util::stream::iter(bytes(f)).chain(futures_util::stream::pending()),
            )),
            Script::ChunksThenError(f, msg) => {
                let mut items = bytes(f);
                items.push(Err(LlmError::StreamRead(msg.to_string())));
                Ok(Box::pin(futures_util::stream::iter(items)))
            }
            Script::Reject { status, message } => Err(LlmError::RequestFailed {
                status: *status,
                message: message.to_string(),
            }),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        Ok(vec![ModelInfo {
            id: "fake-model".to_string(),
            owned_by: None,
        }])
    }
}

/// Lets tests keep a handle on the fake after boxing it.
impl CompletionClient for Arc<FakeClient> {
    fn name(&self) -> &str {
        "fake"
    }

    async fn open_stream(&self, request: &CompletionRequest) -> Result<ByteStream, LlmError> {
        self.as_ref().open_stream(request).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        self.as_ref().list_models().await
    }
}

/// One SSE data line carrying a text delta.
pub fn text_line(text: &str) -> String {
    format!(
        "data: {}\n",
        serde_json::json!({"choices": [{"delta": {"content": text}}]})
    )
}
