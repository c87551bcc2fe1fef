//! Slash command parsing and execution for the chat loop.
//!
//! Commands start with `/` and provide in-chat controls for switching
//! chats and models, attaching images, and showing history.

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Clear the terminal screen.
    Clear,
    /// Exit the chat session.
    Exit,
    /// Start a new chat, optionally titled.
    New(Option<String>),
    /// Show the conversation so far.
    History,
    /// List saved chats.
    Chats,
    /// Switch to another saved chat.
    Switch(i64),
    /// Show the current model, or switch to another.
    Model(Option<String>),
    /// List models offered by the server.
    Models,
    /// Attach an image (path or URL) to the next message; no argument clears it.
    Image(Option<String>),
    /// Unknown or malformed command.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(' ') {
        Some((cmd, rest)) => (cmd.to_lowercase(), Some(rest.trim().to_string())),
        None => (trimmed.to_lowercase(), None),
    };
    let arg = arg.filter(|a| !a.is_empty());

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/clear" | "/cls" => Some(ChatCommand::Clear),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        "/new" => Some(ChatCommand::New(arg)),
        "/history" => Some(ChatCommand::History),
        "/chats" => Some(ChatCommand::Chats),
        "/switch" | "/open" => match arg.as_deref().map(str::parse::<i64>) {
            Some(Ok(id)) => Some(ChatCommand::Switch(id)),
            _ => Some(ChatCommand::Unknown("/switch requires a chat id".to_string())),
        },
        "/model" => Some(ChatCommand::Model(arg)),
        "/models" => Some(ChatCommand::Models),
        "/image" | "/img" => Some(ChatCommand::Image(arg)),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Print the help text listing all available commands.
pub fn print_help() {
    let rows = [
        ("/help", "Show this help message"),
        ("/clear", "Clear the screen"),
        ("/exit", "End the chat session"),
        ("/new [title]", "Start a new chat"),
        ("/history", "Show this chat's messages"),
        ("/chats", "List saved chats"),
        ("/switch <id>", "Open another saved chat"),
        ("/model [id]", "Show or change the model"),
        ("/models", "List models on the server"),
        ("/image [path|url]", "Attach an image to the next message"),
    ];

    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    for (command, description) in rows {
        println!("  {:<20} {}", style(command).cyan(), description);
    }
    println!();
    println!(
        "  {}",
        style("Ctrl+C stops a streaming reply, Ctrl+D exits").dim()
    );
    println!();
}
