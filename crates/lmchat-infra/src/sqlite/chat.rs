//! SQLite chat store implementation.
//!
//! Implements `ChatStore` from `lmchat-core` using sqlx with split read/write
//! pools: raw queries, private Row structs, reader for SELECT, writer for the rest.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use lmchat_core::chat::ChatStore;
use lmchat_types::chat::{Chat, ChatId, ChatMessage, Message, MessageId, MessageRole, DEFAULT_CHAT_TITLE};
use lmchat_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatStore`.
#[derive(Clone)]
pub struct SqliteChatStore {
    pool: DatabasePool,
}

impl SqliteChatStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Fetch a single chat by id.
    pub async fn get_chat(&self, chat_id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query("SELECT id, title, created_at FROM chats WHERE id = ?")
            .bind(chat_id.0)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let chat_row =
                    ChatRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(chat_row.into_chat()?))
            }
            None => Ok(None),
        }
    }

    async fn chat_exists(&self, chat_id: ChatId) -> Result<bool, RepositoryError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM chats WHERE id = ?")
            .bind(chat_id.0)
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.is_some())
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ChatRow {
    id: i64,
    title: String,
    created_at: String,
}

impl ChatRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_chat(self) -> Result<Chat, RepositoryError> {
        Ok(Chat {
            id: ChatId(self.id),
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct MessageRow {
    id: i64,
    chat_id: i64,
    role: String,
    content: Option<String>,
    image: Option<String>,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            image: row.try_get("image")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(RepositoryError::Query)?;

        Ok(ChatMessage {
            id: MessageId(self.id),
            chat_id: ChatId(self.chat_id),
            role,
            content: self.content,
            image: self.image,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC timestamps sort lexically in time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// ChatStore implementation
// ---------------------------------------------------------------------------

impl ChatStore for SqliteChatStore {
    async fn list_chats(&self) -> Result<Vec<Chat>, RepositoryError> {
        let rows = sqlx::query("SELECT id, title, created_at FROM chats ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in &rows {
            let chat_row =
                ChatRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            chats.push(chat_row.into_chat()?);
        }
        Ok(chats)
    }

    async fn create_chat(&self, title: Option<&str>) -> Result<ChatId, RepositoryError> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CHAT_TITLE);

        let result = sqlx::query("INSERT INTO chats (title, created_at) VALUES (?, ?)")
            .bind(title)
            .bind(format_datetime(&Utc::now()))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(ChatId(result.last_insert_rowid()))
    }

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT id, chat_id, role, content, image, created_at
               FROM messages WHERE chat_id = ?
               ORDER BY created_at ASC, id ASC"#,
        )
        .bind(chat_id.0)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(message_row.into_message()?);
        }
        Ok(messages)
    }

    async fn append_message(
        &self,
        chat_id: ChatId,
        message: &Message,
    ) -> Result<MessageId, RepositoryError> {
        if !self.chat_exists(chat_id).await? {
            return Err(RepositoryError::NotFound);
        }

        let result = sqlx::query(
            r#"INSERT INTO messages (chat_id, role, content, image, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(chat_id.0)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(&message.image)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(MessageId(result.last_insert_rowid()))
    }

    async fn rename_chat(&self, chat_id: ChatId, title: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE chats SET title = ? WHERE id = ?")
            .bind(title)
            .bind(chat_id.0)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_chat(&self, chat_id: ChatId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(chat_id.0)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
