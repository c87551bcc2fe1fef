//! Chat management CLI commands: list, new, show, rename, delete.

use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;

use lmchat_core::chat::ChatStore;
use lmchat_types::chat::{ChatId, MessageRole};

use super::spinner;
use crate::state::AppState;

/// List all chats in a table, newest first.
pub async fn list_chats(state: &AppState, json: bool) -> Result<()> {
    let chats = state.store()?.list_chats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chats)?);
        return Ok(());
    }

    if chats.is_empty() {
        println!();
        println!(
            "  {} No chats yet. Start one with: {}",
            style("i").blue().bold(),
            style("lmchat chat").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);

    for chat in &chats {
        table.add_row(vec![
            Cell::new(chat.id).fg(Color::DarkGrey),
            Cell::new(truncate(&chat.title, 60)).fg(Color::Cyan),
            Cell::new(format_relative_time(&chat.created_at)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} chat{}",
        style(chats.len()).bold(),
        if chats.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Create an empty chat.
pub async fn new_chat(state: &AppState, title: Option<String>, json: bool) -> Result<()> {
    let chat_id = state.store()?.create_chat(title.as_deref()).await?;

    if json {
        println!("{}", serde_json::json!({ "chatId": chat_id }));
    } else {
        println!(
            "  {} Created chat {}",
            style("✓").green().bold(),
            style(chat_id).cyan()
        );
    }
    Ok(())
}

/// Print every message of a chat.
pub async fn show_chat(state: &AppState, id: i64, json: bool) -> Result<()> {
    let messages = state.store()?.list_messages(ChatId(id)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!();
        println!("  {} Chat {id} has no messages.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    println!();
    for message in &messages {
        let label = match message.role {
            MessageRole::User => style("You").green().bold(),
            MessageRole::Assistant => style("Assistant").cyan().bold(),
        };
        println!(
            "  {} {}",
            label,
            style(message.created_at.format("%Y-%m-%d %H:%M")).dim()
        );
        if let Some(content) = &message.content {
            for line in content.lines() {
                println!("    {line}");
            }
        }
        if let Some(image) = &message.image {
            println!("    {} {}", style("[image]").magenta(), style(truncate(image, 60)).dim());
        }
        println!();
    }
    Ok(())
}

pub async fn rename_chat(state: &AppState, id: i64, title: &str, json: bool) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        anyhow::bail!("title must not be empty");
    }
    state.store()?.rename_chat(ChatId(id), title).await?;

    if json {
        println!("{}", serde_json::json!({ "renamed": true, "chatId": id }));
    } else {
        println!(
            "  {} Chat {id} renamed to '{}'",
            style("✓").green().bold(),
            style(title).cyan()
        );
    }
    Ok(())
}

/// Delete a chat permanently with confirmation.
pub async fn delete_chat(state: &AppState, id: i64, force: bool, json: bool) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete chat {} and all its messages?",
                style(id).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let progress = spinner(format!("Deleting chat {id}..."));
    let result = state.store()?.delete_chat(ChatId(id)).await;
    progress.finish_and_clear();
    result?;

    if json {
        println!("{}", serde_json::json!({ "deleted": true, "chatId": id }));
    } else {
        println!("  {} Chat {id} deleted.", style("✓").red().bold());
    }
    Ok(())
}

// --- Formatting helpers ---

/// Shorten to at most `max` characters, marking the cut with "...".
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let diff = Utc::now() - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}
