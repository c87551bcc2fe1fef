//! REST chat store.
//!
//! Client side of the chat persistence protocol served by `lmchat serve`
//! (or any backend speaking the same routes). Every request carries a bearer
//! credential obtained from an injected [`CredentialSource`].

pub mod wire;

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use lmchat_core::chat::ChatStore;
use lmchat_types::chat::{Chat, ChatId, ChatMessage, Message, MessageId};
use lmchat_types::error::RepositoryError;

use self::wire::{ChatList, CreatedChat, CreatedMessage, MessageList, NewMessage, TitleBody};

/// Where the bearer credential comes from.
pub enum CredentialSource {
    /// A fixed token.
    Static(SecretString),
    /// Read from the named environment variable on every request.
    Env(String),
}

impl CredentialSource {
    fn token(&self) -> Result<SecretString, RepositoryError> {
        match self {
            Self::Static(token) => Ok(SecretString::from(token.expose_secret().to_string())),
            Self::Env(var) => match std::env::var(var) {
                Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value)),
                _ => {
                    tracing::warn!(var = %var, "credential environment variable not set");
                    Err(RepositoryError::Connection)
                }
            },
        }
    }
}

/// `ChatStore` over HTTP.
pub struct RestChatStore {
    client: reqwest::Client,
    base_url: String,
    credentials: CredentialSource,
}

impl RestChatStore {
    pub fn new(base_url: &str, credentials: CredentialSource) -> Result<Self, RepositoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RepositoryError::Query(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, RepositoryError> {
        let token = self.credentials.token()?;
        let response = builder
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "chat store request failed");
                RepositoryError::Connection
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(RepositoryError::NotFound);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string());
        Err(RepositoryError::Query(format!("{} {message}", status.as_u16())))
    }

    async fn json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RepositoryError> {
        response
            .json()
            .await
            .map_err(|e| RepositoryError::Query(format!("invalid response body: {e}")))
    }
}

impl ChatStore for RestChatStore {
    async fn list_chats(&self) -> Result<Vec<Chat>, RepositoryError> {
        let response = self.send(self.client.get(self.url("chats"))).await?;
        let list: ChatList = Self::json(response).await?;
        Ok(list.chats.into_iter().map(Chat::from).collect())
    }

    async fn create_chat(&self, title: Option<&str>) -> Result<ChatId, RepositoryError> {
        let body = TitleBody {
            title: title.map(str::to_string),
        };
        let response = self
            .send(self.client.post(self.url("chats")).json(&body))
            .await?;
        let created: CreatedChat = Self::json(response).await?;
        Ok(ChatId(created.chat_id))
    }

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let response = self
            .send(self.client.get(self.url(&format!("chats/{chat_id}/messages"))))
            .await?;
        let list: MessageList = Self::json(response).await?;
        Ok(list
            .messages
            .into_iter()
            .map(|m| m.into_chat_message(chat_id))
            .collect())
    }

    #[tracing::instrument(skip_all, fields(chat_id = %chat_id, role = %message.role))]
    async fn append_message(
        &self,
        chat_id: ChatId,
        message: &Message,
    ) -> Result<MessageId, RepositoryError> {
        let response = self
            .send(
                self.client
                    .post(self.url(&format!("chats/{chat_id}/messages")))
                    .json(&NewMessage::from(message)),
            )
            .await?;
        let created: CreatedMessage = Self::json(response).await?;
        Ok(MessageId(created.message_id))
    }

    async fn rename_chat(&self, chat_id: ChatId, title: &str) -> Result<(), RepositoryError> {
        let body = TitleBody {
            title: Some(title.to_string()),
        };
        self.send(
            self.client
                .put(self.url(&format!("chats/{chat_id}")))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn delete_chat(&self, chat_id: ChatId) -> Result<(), RepositoryError> {
        self.send(self.client.delete(self.url(&format!("chats/{chat_id}"))))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmchat_types::chat::MessageRole;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> RestChatStore {
        RestChatStore::new(
            &format!("{}/api/", server.uri()),
            CredentialSource::Static(SecretString::from("tok-123")),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_chats_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chats"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "chats": [
                    {"id": 2, "title": "Recipes", "created_at": "2026-03-02T09:00:00Z"},
                    {"id": 1, "title": "New Chat", "created_at": "2026-03-01T09:00:00Z"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let chats = store_for(&server).list_chats().await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].id, ChatId(2));
        assert_eq!(chats[0].title, "Recipes");
    }

    #[tokio::test]
    async fn test_create_chat_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chats"))
            .and(body_json(serde_json::json!({"title": "Trip"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"chatId": 41})))
            .mount(&server)
            .await;

        let id = store_for(&server).create_chat(Some("Trip")).await.unwrap();
        assert_eq!(id, ChatId(41));
    }

    #[tokio::test]
    async fn test_append_and_list_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chats/5/messages"))
            .and(body_json(serde_json::json!({
                "role": "user", "content": "Hi", "image": null
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"messageId": 10})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/chats/5/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [
                    {"id": 10, "role": "user", "content": "Hi", "image": null, "created_at": "2026-03-01T10:00:00Z"},
                    {"id": 11, "role": "assistant", "content": "Hello there", "created_at": "2026-03-01T10:00:01Z"}
                ]
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let id = store.append_message(ChatId(5), &Message::user("Hi")).await.unwrap();
        assert_eq!(id, MessageId(10));

        let messages = store.list_messages(ChatId(5)).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].chat_id, ChatId(5));
    }

    #[tokio::test]
    async fn test_not_found_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/chats/99"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"error": "chat not found"})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/chats/99"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(matches!(store.delete_chat(ChatId(99)).await, Err(RepositoryError::NotFound)));
        assert!(matches!(
            store.rename_chat(ChatId(99), "x").await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_server_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chats"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "disk full"})))
            .mount(&server)
            .await;

        match store_for(&server).list_chats().await {
            Err(RepositoryError::Query(message)) => assert_eq!(message, "500 disk full"),
            other => panic!("expected Query error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_env_credential_is_connection_error() {
        let server = MockServer::start().await;
        let store = RestChatStore::new(
            &server.uri(),
            CredentialSource::Env("LMCHAT_TEST_TOKEN_THAT_IS_NEVER_SET".to_string()),
        )
        .unwrap();
        assert!(matches!(store.list_chats().await, Err(RepositoryError::Connection)));
    }
}
