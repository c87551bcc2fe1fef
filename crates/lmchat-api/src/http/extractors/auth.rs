//! API key authentication extractor.
//!
//! Extracts and verifies API keys from:
//! - `Authorization: Bearer <key>` header
//! - `X-API-Key: <key>` header
//!
//! Keys are SHA-256 hashed and compared against the `api_keys` table.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};
use sqlx::Row;

use crate::http::error::AppError;
use crate::state::ServerState;

/// Prefix of generated keys, so they are recognizable in config files.
pub const API_KEY_PREFIX: &str = "lmchat_";

/// Authenticated request marker. Extracting this validates the API key.
pub struct Authenticated;

impl FromRequestParts<ServerState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = extract_api_key(parts)?;
        let key_hash = hash_api_key(&api_key);

        let result = sqlx::query("SELECT id FROM api_keys WHERE key_hash = ?")
            .bind(&key_hash)
            .fetch_optional(&state.db_pool.reader)
            .await
            .map_err(|e| AppError::Internal(format!("Database error: {e}")))?;

        match result {
            Some(row) => {
                // Best effort; a failed timestamp update never fails the request.
                let id: String = row.get("id");
                let now = chrono::Utc::now().to_rfc3339();
                let _ = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
                    .bind(&now)
                    .bind(&id)
                    .execute(&state.db_pool.writer)
                    .await;
                Ok(Authenticated)
            }
            None => {
                tracing::debug!("rejected request with unknown API key");
                Err(AppError::Unauthorized("Invalid API key".to_string()))
            }
        }
    }
}

/// Extract the API key from request headers.
fn extract_api_key(parts: &Parts) -> Result<String, AppError> {
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(key.trim().to_string());
        }
    }

    if let Some(key) = parts.headers.get("x-api-key") {
        let key_str = key.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-API-Key header encoding".to_string())
        })?;
        return Ok(key_str.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing API key. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
    ))
}

/// Compute SHA-256 hash of an API key (lowercase hex).
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)
}

/// Random key: prefix plus 64 hex characters from two v4 UUIDs.
fn generate_api_key() -> String {
    format!(
        "{API_KEY_PREFIX}{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Store a freshly generated key and return the plaintext.
pub async fn create_api_key(state: &ServerState, name: &str) -> anyhow::Result<String> {
    let plaintext_key = generate_api_key();
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("INSERT INTO api_keys (id, key_hash, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(hash_api_key(&plaintext_key))
        .bind(name)
        .bind(&now)
        .execute(&state.db_pool.writer)
        .await?;

    Ok(plaintext_key)
}

/// Generate the first API key if none exists.
///
/// Returns the plaintext key only when one was created; it is never
/// recoverable afterwards.
pub async fn ensure_api_key(state: &ServerState) -> anyhow::Result<Option<String>> {
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM api_keys LIMIT 1")
        .fetch_optional(&state.db_pool.reader)
        .await?;

    if existing.is_some() {
        return Ok(None);
    }

    let key = create_api_key(state, "default").await?;
    tracing::info!("generated initial API key");
    Ok(Some(key))
}
