//! ChatStore trait definition.
//!
//! The persistence collaborator: chat CRUD plus append-only message storage.
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use lmchat_types::chat::{Chat, ChatId, ChatMessage, Message, MessageId};
use lmchat_types::error::RepositoryError;

/// Repository trait for chats and their messages.
///
/// Implementations live in lmchat-infra (`SqliteChatStore`, `RestChatStore`).
/// Messages are never updated or deleted individually; deleting a chat
/// removes its messages with it.
pub trait ChatStore: Send + Sync {
    /// List all chats, newest first.
    fn list_chats(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Chat>, RepositoryError>> + Send;

    /// Create a chat. A missing title becomes "New Chat".
    fn create_chat(
        &self,
        title: Option<&str>,
    ) -> impl std::future::Future<Output = Result<ChatId, RepositoryError>> + Send;

    /// Messages of a chat, ordered by `created_at` ascending.
    fn list_messages(
        &self,
        chat_id: ChatId,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Durably append one finished message to a chat.
    fn append_message(
        &self,
        chat_id: ChatId,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<MessageId, RepositoryError>> + Send;

    fn rename_chat(
        &self,
        chat_id: ChatId,
        title: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a chat and all of its messages.
    fn delete_chat(
        &self,
        chat_id: ChatId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
