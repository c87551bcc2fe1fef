//! HTTP/REST API layer for lmchat.
//!
//! Axum-based chat persistence API under `/api` with API key
//! authentication and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
