//! Shared domain types for lmchat.
//!
//! This crate contains the types used across the lmchat workspace:
//! messages and chats, the token budget, decoded stream events, configuration,
//! and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
