//! JSON bodies of the chat persistence protocol.
//!
//! Shared by [`super::RestChatStore`] (client side) and the `lmchat serve`
//! handlers (server side), so both ends agree on field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lmchat_types::chat::{Chat, ChatId, ChatMessage, Message, MessageId, MessageRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatList {
    pub chats: Vec<ChatEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl From<Chat> for ChatEntry {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id.0,
            title: chat.title,
            created_at: chat.created_at,
        }
    }
}

impl From<ChatEntry> for Chat {
    fn from(entry: ChatEntry) -> Self {
        Self {
            id: ChatId(entry.id),
            title: entry.title,
            created_at: entry.created_at,
        }
    }
}

/// Body of `POST /chats` and `PUT /chats/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TitleBody {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedChat {
    pub chat_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageList {
    pub messages: Vec<MessageEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEntry {
    pub id: i64,
    pub role: MessageRole,
    pub content: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessage> for MessageEntry {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id.0,
            role: message.role,
            content: message.content,
            image: message.image,
            created_at: message.created_at,
        }
    }
}

impl MessageEntry {
    pub fn into_chat_message(self, chat_id: ChatId) -> ChatMessage {
        ChatMessage {
            id: MessageId(self.id),
            chat_id,
            role: self.role,
            content: self.content,
            image: self.image,
            created_at: self.created_at,
        }
    }
}

/// Body of `POST /chats/{id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl From<&Message> for NewMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            image: message.image.clone(),
        }
    }
}

impl From<NewMessage> for Message {
    fn from(body: NewMessage) -> Self {
        Self {
            role: body.role,
            content: body.content,
            image: body.image,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMessage {
    pub message_id: i64,
}
