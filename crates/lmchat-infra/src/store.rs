//! Storage backend selection.
//!
//! [`AnyChatStore`] lets the CLI pick the SQLite or REST store from config
//! while the controller stays generic over a single concrete `ChatStore`.

use std::path::Path;

use secrecy::SecretString;

use lmchat_core::chat::ChatStore;
use lmchat_types::chat::{Chat, ChatId, ChatMessage, Message, MessageId};
use lmchat_types::config::{StorageBackend, StorageConfig};
use lmchat_types::error::RepositoryError;

use crate::rest::{CredentialSource, RestChatStore};
use crate::sqlite::{DatabasePool, SqliteChatStore};

pub enum AnyChatStore {
    Sqlite(SqliteChatStore),
    Rest(RestChatStore),
}

impl AnyChatStore {
    /// Open the store configured in `[storage]`.
    ///
    /// The SQLite database lives in `data_dir`; the remote backend reads its
    /// bearer token from `token_env` on each request.
    pub async fn open(config: &StorageConfig, data_dir: &Path) -> Result<Self, RepositoryError> {
        match config.backend {
            StorageBackend::Sqlite => {
                let pool = DatabasePool::open_in(data_dir).await.map_err(|e| {
                    tracing::error!(error = %e, dir = %data_dir.display(), "failed to open database");
                    RepositoryError::Connection
                })?;
                Ok(Self::Sqlite(SqliteChatStore::new(pool)))
            }
            StorageBackend::Remote => {
                let url = config.remote_url.as_deref().ok_or_else(|| {
                    RepositoryError::Query("storage.remote_url is not set".to_string())
                })?;
                let store = RestChatStore::new(url, CredentialSource::Env(config.token_env.clone()))?;
                Ok(Self::Rest(store))
            }
        }
    }

    /// Remote store with a fixed token.
    pub fn remote(url: &str, token: SecretString) -> Result<Self, RepositoryError> {
        Ok(Self::Rest(RestChatStore::new(url, CredentialSource::Static(token))?))
    }

    pub fn backend(&self) -> StorageBackend {
        match self {
            Self::Sqlite(_) => StorageBackend::Sqlite,
            Self::Rest(_) => StorageBackend::Remote,
        }
    }
}

impl ChatStore for AnyChatStore {
    async fn list_chats(&self) -> Result<Vec<Chat>, RepositoryError> {
        match self {
            Self::Sqlite(s) => s.list_chats().await,
            Self::Rest(s) => s.list_chats().await,
        }
    }

    async fn create_chat(&self, title: Option<&str>) -> Result<ChatId, RepositoryError> {
        match self {
            Self::Sqlite(s) => s.create_chat(title).await,
            Self::Rest(s) => s.create_chat(title).await,
        }
    }

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<ChatMessage>, RepositoryError> {
        match self {
            Self::Sqlite(s) => s.list_messages(chat_id).await,
            Self::Rest(s) => s.list_messages(chat_id).await,
        }
    }

    async fn append_message(
        &self,
        chat_id: ChatId,
        message: &Message,
    ) -> Result<MessageId, RepositoryError> {
        match self {
            Self::Sqlite(s) => s.append_message(chat_id, message).await,
            Self::Rest(s) => s.append_message(chat_id, message).await,
        }
    }

    async fn rename_chat(&self, chat_id: ChatId, title: &str) -> Result<(), RepositoryError> {
        match self {
            Self::Sqlite(s) => s.rename_chat(chat_id, title).await,
            Self::Rest(s) => s.rename_chat(chat_id, title).await,
        }
    }

    async fn delete_chat(&self, chat_id: ChatId) -> Result<(), RepositoryError> {
        match self {
            Self::Sqlite(s) => s.delete_chat(chat_id).await,
            Self::Rest(s) => s.delete_chat(chat_id).await,
        }
    }
}
