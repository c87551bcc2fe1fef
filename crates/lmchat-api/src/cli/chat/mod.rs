//! Interactive terminal chat.
//!
//! Streams replies through the session controller with incremental output,
//! slash commands, image attachments and per-reply budget stats. Entry point:
//! `loop_runner::run_chat_loop`.

pub mod attachment;
pub mod banner;
pub mod budget_display;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
