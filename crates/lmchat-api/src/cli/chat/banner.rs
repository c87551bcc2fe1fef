//! Welcome banner display for chat sessions.

use console::style;

use lmchat_types::chat::ChatId;

/// Print the welcome banner at the start of a chat session.
pub fn print_welcome_banner(title: &str, chat_id: ChatId, model: &str, base_url: &str) {
    println!();
    println!("  {} {}", style("lmchat").cyan().bold(), style(title).bold());
    println!();
    println!("  {}  {}", style("Model:").bold(), style(model).dim());
    println!("  {} {}", style("Server:").bold(), style(base_url).dim());
    println!("  {}   {}", style("Chat:").bold(), style(chat_id).dim());
    println!();
    println!(
        "  {}",
        style("Type /help for commands, Ctrl+C stops a reply, Ctrl+D exits").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}
