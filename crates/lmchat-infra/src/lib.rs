//! Infrastructure layer for lmchat.
//!
//! Contains implementations of the ports defined in `lmchat-core`: the
//! OpenAI-compatible completion client, the SQLite and REST chat stores, and
//! configuration loading.

pub mod config;
pub mod llm;
pub mod rest;
pub mod sqlite;
pub mod store;
