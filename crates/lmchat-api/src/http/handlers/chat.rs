//! Chat persistence HTTP handlers.
//!
//! Endpoints:
//! - GET    /api/chats                - List chats, newest first
//! - POST   /api/chats                - Create a chat
//! - GET    /api/chats/{id}/messages  - Messages of a chat, oldest first
//! - POST   /api/chats/{id}/messages  - Append a message
//! - PUT    /api/chats/{id}           - Rename a chat
//! - DELETE /api/chats/{id}           - Delete a chat and its messages

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use lmchat_core::chat::ChatStore;
use lmchat_infra::rest::wire::{
    ChatEntry, ChatList, CreatedChat, CreatedMessage, MessageEntry, MessageList, NewMessage,
    TitleBody,
};
use lmchat_types::chat::{ChatId, Message};
use lmchat_types::error::RepositoryError;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::state::ServerState;

/// Parse a chat id from a path parameter, returning a 400 on invalid format.
fn parse_chat_id(s: &str) -> Result<ChatId, AppError> {
    s.parse::<ChatId>()
        .map_err(|_| AppError::Validation(format!("Invalid chat id: {s}")))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|e| AppError::Validation(e.body_text()))
}

async fn require_chat(state: &ServerState, chat_id: ChatId) -> Result<(), AppError> {
    match state.store.get_chat(chat_id).await? {
        Some(_) => Ok(()),
        None => Err(RepositoryError::NotFound.into()),
    }
}

/// GET /api/chats
pub async fn list_chats(
    State(state): State<ServerState>,
    _auth: Authenticated,
) -> Result<Json<ChatList>, AppError> {
    let chats = state.store.list_chats().await?;
    Ok(Json(ChatList {
        chats: chats.into_iter().map(ChatEntry::from).collect(),
    }))
}

/// POST /api/chats
pub async fn create_chat(
    State(state): State<ServerState>,
    _auth: Authenticated,
    payload: Result<Json<TitleBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedChat>), AppError> {
    // An empty body is allowed; the chat gets the default title.
    let title = match payload {
        Ok(Json(body)) => body.title,
        Err(JsonRejection::MissingJsonContentType(_)) => None,
        Err(e) => return Err(AppError::Validation(e.body_text())),
    };

    let chat_id = state.store.create_chat(title.as_deref()).await?;
    tracing::info!(chat_id = %chat_id, "chat created");
    Ok((StatusCode::CREATED, Json(CreatedChat { chat_id: chat_id.0 })))
}

/// GET /api/chats/{id}/messages
pub async fn list_messages(
    State(state): State<ServerState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<MessageList>, AppError> {
    let chat_id = parse_chat_id(&id)?;
    require_chat(&state, chat_id).await?;

    let messages = state.store.list_messages(chat_id).await?;
    Ok(Json(MessageList {
        messages: messages.into_iter().map(MessageEntry::from).collect(),
    }))
}

/// POST /api/chats/{id}/messages
pub async fn append_message(
    State(state): State<ServerState>,
    _auth: Authenticated,
    Path(id): Path<String>,
    payload: Result<Json<NewMessage>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedMessage>), AppError> {
    let chat_id = parse_chat_id(&id)?;
    let message = Message::from(body(payload)?);
    if message.content.is_none() && message.image.is_none() {
        return Err(AppError::Validation(
            "Message needs content or an image".to_string(),
        ));
    }

    let message_id = state.store.append_message(chat_id, &message).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedMessage {
            message_id: message_id.0,
        }),
    ))
}

/// PUT /api/chats/{id}
pub async fn rename_chat(
    State(state): State<ServerState>,
    _auth: Authenticated,
    Path(id): Path<String>,
    payload: Result<Json<TitleBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let chat_id = parse_chat_id(&id)?;
    let title = body(payload)?
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Title must not be empty".to_string()))?;

    state.store.rename_chat(chat_id, &title).await?;
    Ok(Json(json!({ "message": "Chat title updated successfully" })))
}

/// DELETE /api/chats/{id}
pub async fn delete_chat(
    State(state): State<ServerState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let chat_id = parse_chat_id(&id)?;
    state.store.delete_chat(chat_id).await?;
    tracing::info!(chat_id = %chat_id, "chat deleted");
    Ok(Json(json!({ "message": "Chat deleted successfully" })))
}
