//! CLI command definitions for the `lmchat` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod chats;
pub mod models;

use std::time::Duration;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use indicatif::{ProgressBar, ProgressStyle};

/// Chat with a local or remote OpenAI-compatible model from the terminal.
#[derive(Parser)]
#[command(name = "lmchat", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Model id to request (overrides `model.default_model`).
    #[arg(long, global = true, env = "LMCHAT_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API (overrides `model.base_url`).
    #[arg(long, global = true, env = "LMCHAT_BASE_URL")]
    pub base_url: Option<String>,

    /// Export tracing spans to stdout via OpenTelemetry.
    #[arg(long, global = true, hide = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive streaming chat.
    Chat {
        /// Resume an existing chat by id.
        #[arg(long, conflicts_with = "new")]
        chat: Option<i64>,

        /// Always start a fresh chat instead of resuming the newest one.
        #[arg(long)]
        new: bool,
    },

    /// Manage saved chats.
    Chats {
        #[command(subcommand)]
        action: ChatsCommand,
    },

    /// List models offered by the model service.
    Models,

    /// Serve the chat persistence REST API.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ChatsCommand {
    /// List chats, newest first.
    #[command(alias = "ls")]
    List,

    /// Create an empty chat.
    New {
        /// Chat title (defaults to "New Chat").
        title: Option<String>,
    },

    /// Print a chat's messages.
    Show {
        /// Chat id.
        id: i64,
    },

    /// Rename a chat.
    Rename {
        /// Chat id.
        id: i64,
        /// New title.
        title: String,
    },

    /// Delete a chat and all its messages.
    #[command(alias = "rm")]
    Delete {
        /// Chat id.
        id: i64,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },
}

/// Steady-ticking spinner shared by the commands that wait on I/O.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
