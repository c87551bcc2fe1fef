//! Streaming completion protocol and context budgeting for lmchat.
//!
//! This crate holds the core logic (token estimation, history budgeting,
//! stream decoding, draft assembly, the session state machine, and the chat
//! controller) and defines the "ports" the infrastructure layer implements:
//! `CompletionClient` and `ChatStore`. It depends only on `lmchat-types` --
//! never on `lmchat-infra` or any database/HTTP crate.

pub mod chat;
pub mod context;
pub mod llm;
pub mod stream;
