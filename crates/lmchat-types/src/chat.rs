//! Chat, message, and draft types for lmchat.
//!
//! A [`Message`] is one turn of a conversation as it is sent to the model.
//! A [`ChatMessage`] is the persisted form of that turn, owned by a [`Chat`].
//! The [`AssistantDraft`] is the single in-flight assistant message that is
//! assembled while a response streams in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Author of a message in a conversation.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (role IN ('user', 'assistant'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single turn of a conversation.
///
/// `content` is nullable because a user may send an image with no text.
/// `image` is an opaque URI or data-URI reference; it is never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Message {
    /// A user turn with text only.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            image: None,
        }
    }

    /// An assistant turn with text only.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            image: None,
        }
    }

    /// Attach an image reference to this message.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Text content, or the empty string when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Identifier of a chat (SQLite rowid on the persistence side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChatId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| format!("invalid chat id: '{s}'"))
    }
}

/// Identifier of a persisted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat as listed by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Default title given to chats created without one.
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// A persisted message within a chat.
///
/// Messages are ordered by `created_at` (ties broken by `id`) within a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub role: MessageRole,
    pub content: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// The conversation view of this persisted message.
    pub fn to_message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
            image: self.image.clone(),
        }
    }
}

/// The in-flight assistant message assembled from a response stream.
///
/// Starts empty, grows by appending text deltas in arrival order, and is
/// frozen into a [`Message`] when the stream completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantDraft {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl AssistantDraft {
    /// Whether nothing has been assembled yet.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.image.is_none()
    }

    /// Conversation view of the draft without consuming it.
    pub fn to_message(&self) -> Message {
        Message {
            role: MessageRole::Assistant,
            content: Some(self.content.clone()),
            image: self.image.clone(),
        }
    }

    /// Freeze the draft into a finished assistant message.
    pub fn into_message(self) -> Message {
        Message {
            role: MessageRole::Assistant,
            content: Some(self.content),
            image: self.image,
        }
    }
}
