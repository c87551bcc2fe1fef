//! Axum router configuration with middleware.
//!
//! Chat routes live under `/api/`; `/health` is unauthenticated.
//! Middleware: CORS, tracing.

use axum::routing::{get, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::ServerState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/chats",
            get(handlers::chat::list_chats).post(handlers::chat::create_chat),
        )
        .route(
            "/chats/{id}",
            put(handlers::chat::rename_chat).delete(handlers::chat::delete_chat),
        )
        .route(
            "/chats/{id}/messages",
            get(handlers::chat::list_messages).post(handlers::chat::append_message),
        );

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use lmchat_infra::sqlite::DatabasePool;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::http::extractors::auth::create_api_key;

    async fn test_app() -> (Router, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        let state = ServerState::from_pool(DatabasePool::open_in(&path).await.unwrap());
        let key = create_api_key(&state, "test").await.unwrap();
        (build_router(state), key)
    }

    fn request(method: &str, uri: &str, key: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {key}"));
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_needs_no_key() {
        let (app, _) = test_app().await;
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn missing_or_wrong_key_is_401() {
        let (app, _) = test_app().await;
        let req = Request::builder().uri("/api/chats").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = send(&app, request("GET", "/api/chats", "lmchat_wrong", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn x_api_key_header_accepted() {
        let (app, key) = test_app().await;
        let req = Request::builder()
            .uri("/api/chats")
            .header("x-api-key", &key)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"chats": []}));
    }

    #[tokio::test]
    async fn chat_lifecycle() {
        let (app, key) = test_app().await;

        let (status, body) = send(&app, request("POST", "/api/chats", &key, Some(json!({})))).await;
        assert_eq!(status, StatusCode::CREATED);
        let chat_id = body["chatId"].as_i64().unwrap();

        let uri = format!("/api/chats/{chat_id}/messages");
        let (status, body) = send(
            &app,
            request("POST", &uri, &key, Some(json!({"role": "user", "content": "Hi"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["messageId"].is_i64());

        send(
            &app,
            request(
                "POST",
                &uri,
                &key,
                Some(json!({"role": "assistant", "content": "Hello there"})),
            ),
        )
        .await;

        let (status, body) = send(&app, request("GET", &uri, &key, None)).await;
        assert_eq!(status, StatusCode::OK);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["content"], "Hello there");

        let chat_uri = format!("/api/chats/{chat_id}");
        let (status, _) = send(
            &app,
            request("PUT", &chat_uri, &key, Some(json!({"title": "Greetings"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, request("GET", "/api/chats", &key, None)).await;
        assert_eq!(body["chats"][0]["title"], "Greetings");
        assert_eq!(body["chats"][0]["id"], chat_id);

        let (status, _) = send(&app, request("DELETE", &chat_uri, &key, None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, request("GET", &uri, &key, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Chat not found");
    }

    #[tokio::test]
    async fn create_chat_without_body_uses_default_title() {
        let (app, key) = test_app().await;
        let (status, _) = send(&app, request("POST", "/api/chats", &key, None)).await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, body) = send(&app, request("GET", "/api/chats", &key, None)).await;
        assert_eq!(body["chats"][0]["title"], "New Chat");
    }

    #[tokio::test]
    async fn invalid_requests_are_400() {
        let (app, key) = test_app().await;

        let (status, body) = send(&app, request("GET", "/api/chats/abc/messages", &key, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("abc"));

        let (_, body) = send(&app, request("POST", "/api/chats", &key, Some(json!({})))).await;
        let chat_id = body["chatId"].as_i64().unwrap();

        let (status, _) = send(
            &app,
            request(
                "POST",
                &format!("/api/chats/{chat_id}/messages"),
                &key,
                Some(json!({"role": "user", "content": null})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            request(
                "PUT",
                &format!("/api/chats/{chat_id}"),
                &key,
                Some(json!({"title": "  "})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_chat_is_404() {
        let (app, key) = test_app().await;
        let (status, _) = send(
            &app,
            request(
                "POST",
                "/api/chats/999/messages",
                &key,
                Some(json!({"role": "user", "content": "orphan"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, request("DELETE", "/api/chats/999", &key, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
