//! Wire types for the OpenAI-compatible chat completions API.
//!
//! Request types borrow from the domain [`CompletionRequest`] so building a
//! body never copies message text or image payloads.

use serde::{Deserialize, Serialize};

use lmchat_types::chat::{Message, MessageRole};
use lmchat_types::llm::{CompletionRequest, ModelInfo};

/// Body of `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatCompletionBody<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage<'a>>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
}

impl<'a> From<&'a CompletionRequest> for ChatCompletionBody<'a> {
    fn from(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: request.stream,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WireMessage<'a> {
    pub role: MessageRole,
    pub content: WireContent<'a>,
}

/// A bare string, or the two-part array required when an image is attached.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WireContent<'a> {
    Text(Option<&'a str>),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl<'a> {
    pub url: &'a str,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        let content = match message.image.as_deref() {
            Some(url) => WireContent::Parts(vec![
                ContentPart::Text {
                    text: message.content.as_deref().unwrap_or(""),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url },
                },
            ]),
            None => WireContent::Text(message.content.as_deref()),
        };
        Self {
            role: message.role,
            content,
        }
    }
}

/// Non-success response body: `{"error": {"message": "..."}}`.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

/// Response of `GET /models`.
#[derive(Debug, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
}

impl From<ModelEntry> for ModelInfo {
    fn from(entry: ModelEntry) -> Self {
        ModelInfo {
            id: entry.id,
            owned_by: entry.owned_by,
        }
    }
}
