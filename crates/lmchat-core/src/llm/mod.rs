//! Model-service port for lmchat.
//!
//! - `CompletionClient`: RPITIT trait for concrete backends
//! - `BoxCompletionClient`: Object-safe wrapper for dynamic dispatch

pub mod box_client;
pub mod client;

pub use box_client::BoxCompletionClient;
pub use client::{ByteStream, CompletionClient};

#[cfg(test)]
pub(crate) mod fake;
