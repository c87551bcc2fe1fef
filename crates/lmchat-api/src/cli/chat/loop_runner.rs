//! Main chat loop orchestration.
//!
//! Resolves the model and the chat to open, prints the banner, then reads
//! lines until EOF. Each message is handed to the `ChatSessionController`;
//! while it streams, conversation snapshots are printed incrementally and
//! Ctrl+C cancels the reply.

use console::style;

use lmchat_core::chat::{SendOutcome, UserInput};
use lmchat_types::chat::{Chat, ChatId, Message, MessageRole};
use lmchat_types::error::ChatError;
use lmchat_types::llm::Budget;

use crate::cli::chats::truncate;
use crate::cli::spinner;
use crate::state::{AppState, ConcreteController};

use super::attachment::{describe, resolve_image};
use super::banner::print_welcome_banner;
use super::budget_display::{render_completion_stats, render_context_counter, render_trimmed_notice};
use super::commands::{self, ChatCommand};
use super::input::{prompt_for, ChatInput, InputEvent};
use super::renderer::{ChatRenderer, DraftPrinter};

/// Run the interactive chat loop.
///
/// Opens `resume` when given, otherwise the newest chat (or a fresh one when
/// there is none or `force_new` is set).
pub async fn run_chat_loop(state: AppState, resume: Option<i64>, force_new: bool) -> anyhow::Result<()> {
    let base_url = state.config.model.base_url.clone();
    let budget = state.config.budget;
    let explicit_model = state.config.model.default_model.is_some();
    let (controller, _) = state.into_controller()?;

    if !explicit_model {
        pick_server_model(&controller).await;
    }

    let chat = open_initial_chat(&controller, resume, force_new).await?;
    let renderer = ChatRenderer::new();

    print_welcome_banner(&chat.title, chat.id, &controller.model(), &base_url);
    let history = controller.conversation();
    if !history.is_empty() {
        print_history(&renderer, &history);
    }

    let mut pending_image: Option<String> = None;
    let mut input = ChatInput::new(prompt_for(false));

    loop {
        let event = input.read_line().await?;
        let text = match event {
            InputEvent::Eof => {
                println!("\n  {}", style("Session ended.").dim());
                break;
            }
            InputEvent::Interrupted => {
                println!("  {}", style("Press Ctrl+D to exit, or keep chatting.").dim());
                continue;
            }
            InputEvent::Message(text) => text,
        };

        if let Some(cmd) = commands::parse(&text) {
            match cmd {
                ChatCommand::Help => commands::print_help(),
                ChatCommand::Clear => input.clear(),
                ChatCommand::Exit => {
                    println!("\n  {}", style("Session ended.").dim());
                    break;
                }
                ChatCommand::New(title) => match controller.new_chat(title.as_deref()).await {
                    Ok(chat_id) => println!(
                        "\n  {} Started chat {}\n",
                        style("✓").green().bold(),
                        style(chat_id).cyan()
                    ),
                    Err(e) => print_error(&e),
                },
                ChatCommand::History => print_history(&renderer, &controller.conversation()),
                ChatCommand::Chats => match controller.list_chats().await {
                    Ok(chats) => print_chats(&chats, controller.current_chat()),
                    Err(e) => print_error(&e),
                },
                ChatCommand::Switch(id) => match switch_chat(&controller, ChatId(id)).await {
                    Ok(chat) => {
                        println!(
                            "\n  {} Opened '{}'",
                            style("✓").green().bold(),
                            style(&chat.title).cyan()
                        );
                        print_history(&renderer, &controller.conversation());
                    }
                    Err(e) => println!("\n  {} {e}\n", style("!").red().bold()),
                },
                ChatCommand::Model(None) => {
                    println!("\n  {}  {}\n", style("Model:").bold(), controller.model());
                }
                ChatCommand::Model(Some(model)) => {
                    controller.set_model(model.clone());
                    println!(
                        "\n  {} Using model {}\n",
                        style("✓").green().bold(),
                        style(model).cyan()
                    );
                }
                ChatCommand::Models => print_models(&controller).await,
                ChatCommand::Image(None) => {
                    pending_image = None;
                    input.update_prompt(prompt_for(false));
                    println!("  {}", style("Image attachment cleared.").dim());
                }
                ChatCommand::Image(Some(source)) => match resolve_image(&source).await {
                    Ok(image) => {
                        println!(
                            "  {} Attached {} to the next message",
                            style("+").magenta().bold(),
                            style(describe(&image)).dim()
                        );
                        pending_image = Some(image);
                        input.update_prompt(prompt_for(true));
                    }
                    Err(e) => println!("  {} {e:#}", style("!").red().bold()),
                },
                ChatCommand::Unknown(name) => println!(
                    "\n  {} Unknown command: {}. Type /help for available commands.\n",
                    style("?").yellow().bold(),
                    style(name).dim()
                ),
            }
            continue;
        }

        if text.is_empty() && pending_image.is_none() {
            continue;
        }

        let mut user_input = UserInput::text(text);
        if let Some(image) = pending_image.take() {
            user_input = user_input.with_image(image);
            input.update_prompt(prompt_for(false));
        }
        stream_reply(&controller, user_input, &renderer, &budget).await;
    }

    Ok(())
}

/// Adopt the first model the server reports when none was configured.
async fn pick_server_model(controller: &ConcreteController) {
    match controller.client().list_models().await {
        Ok(models) => match models.first() {
            Some(model) => {
                tracing::info!(model = %model.id, "using first model reported by server");
                controller.set_model(model.id.clone());
            }
            None => tracing::warn!("server reported no models"),
        },
        Err(e) => {
            tracing::warn!(error = %e, "could not list models");
            println!(
                "  {} Could not list models ({e}). Is the model server running?",
                style("!").yellow().bold()
            );
        }
    }
}

async fn open_initial_chat(
    controller: &ConcreteController,
    resume: Option<i64>,
    force_new: bool,
) -> anyhow::Result<Chat> {
    if let Some(id) = resume {
        return switch_chat(controller, ChatId(id)).await;
    }
    if !force_new {
        if let Some(latest) = controller.list_chats().await?.into_iter().next() {
            controller.select_chat(latest.id).await?;
            return Ok(latest);
        }
    }
    let chat_id = controller.new_chat(None).await?;
    find_chat(controller, chat_id).await
}

/// Select an existing chat; unknown ids are an error rather than an empty chat.
async fn switch_chat(controller: &ConcreteController, chat_id: ChatId) -> anyhow::Result<Chat> {
    let chat = find_chat(controller, chat_id).await?;
    controller.select_chat(chat_id).await?;
    Ok(chat)
}

async fn find_chat(controller: &ConcreteController, chat_id: ChatId) -> anyhow::Result<Chat> {
    controller
        .list_chats()
        .await?
        .into_iter()
        .find(|c| c.id == chat_id)
        .ok_or_else(|| anyhow::anyhow!("chat {chat_id} not found"))
}

/// Send one message and print the reply as it streams.
async fn stream_reply(
    controller: &ConcreteController,
    input: UserInput,
    renderer: &ChatRenderer,
    budget: &Budget,
) {
    let mut view = controller.subscribe();
    // The user message lands at `base`, the assistant draft right after it.
    let base = controller.conversation().len();
    let draft_index = base + 1;

    let thinking = spinner("thinking...");
    let mut printer = DraftPrinter::default();
    let mut cancel_requested = false;

    let send = controller.send(input);
    tokio::pin!(send);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            biased;
            result = &mut send => break result,
            _ = &mut ctrl_c, if !cancel_requested => {
                cancel_requested = true;
                controller.cancel();
            }
            Ok(()) = view.changed() => {
                let draft = view.borrow_and_update().get(draft_index).cloned();
                if let Some(draft) = draft.filter(|m| m.role == MessageRole::Assistant) {
                    print_draft(renderer, &mut printer, &draft, &thinking);
                }
            }
        }
    };

    // The final snapshot may not have been observed before `send` returned.
    if let Some(draft) = controller
        .conversation()
        .get(draft_index)
        .filter(|m| m.role == MessageRole::Assistant)
    {
        print_draft(renderer, &mut printer, draft, &thinking);
    }
    thinking.finish_and_clear();
    if printer.has_output() {
        println!();
    }

    match result {
        Ok(SendOutcome::Completed { stats, .. }) => {
            println!();
            println!("{}", render_completion_stats(&stats, &controller.model()));
            println!("{}", render_context_counter(stats.tokens_consumed, budget.max_context_tokens));
            if let Some(notice) = render_trimmed_notice(stats.messages_sent, draft_index) {
                println!("{notice}");
            }
            println!();
        }
        Ok(SendOutcome::Cancelled { partial }) => {
            let note = if partial.is_empty() {
                "Reply cancelled.".to_string()
            } else {
                "Reply stopped; the partial text is shown but not saved.".to_string()
            };
            println!("\n  {}\n", style(note).yellow());
        }
        Err(ChatError::StreamReadFailed(msg)) => {
            println!("\n  {} Connection lost mid-reply: {msg}", style("!").red().bold());
            println!(
                "  {}\n",
                style("The partial reply is shown but not saved. Send again to retry.").dim()
            );
        }
        Err(e) => print_error(&e),
    }
}

fn print_draft(renderer: &ChatRenderer, printer: &mut DraftPrinter, draft: &Message, thinking: &indicatif::ProgressBar) {
    let unseen = printer.unseen(draft.text());
    let new_image = printer.first_image(draft.image.as_deref());
    if unseen.is_empty() && !new_image {
        return;
    }
    if !thinking.is_finished() {
        thinking.finish_and_clear();
        print!("\n  {} ", style("Assistant").cyan().bold());
    }
    renderer.print_streaming_text(unseen);
    if new_image {
        if let Some(image) = &draft.image {
            print!("\n  {} {}", style("[image]").magenta(), style(describe(image)).dim());
        }
    }
}

fn print_history(renderer: &ChatRenderer, messages: &[Message]) {
    println!();
    if messages.is_empty() {
        println!("  {}\n", style("No messages yet.").dim());
        return;
    }
    for message in messages {
        match message.role {
            MessageRole::User => {
                println!("  {} {}", style("You").green().bold(), message.text());
            }
            MessageRole::Assistant => {
                println!("  {}", style("Assistant").cyan().bold());
                for line in renderer.render_final(message.text()).lines() {
                    println!("  {line}");
                }
            }
        }
        if let Some(image) = &message.image {
            println!("    {} {}", style("[image]").magenta(), style(describe(image)).dim());
        }
        println!();
    }
}

fn print_chats(chats: &[Chat], current: Option<ChatId>) {
    println!();
    if chats.is_empty() {
        println!("  {}\n", style("No saved chats.").dim());
        return;
    }
    for chat in chats {
        let marker = if Some(chat.id) == current { "●" } else { " " };
        println!(
            "  {} {:>4}  {}",
            style(marker).green(),
            style(chat.id).dim(),
            truncate(&chat.title, 60)
        );
    }
    println!();
}

async fn print_models(controller: &ConcreteController) {
    let progress = spinner("Listing models...");
    let result = lmchat_infra::llm::sorted_models(controller.client()).await;
    progress.finish_and_clear();
    match result {
        Ok(models) => {
            let current = controller.model();
            println!();
            for model in models {
                let marker = if model.id == current { "●" } else { " " };
                println!("  {} {}", style(marker).green(), model.id);
            }
            println!();
        }
        Err(e) => println!("\n  {} {e}\n", style("!").red().bold()),
    }
}

fn print_error(error: &ChatError) {
    let hint = match error {
        ChatError::RequestFailed(_) => "Check that the model server is running and the model is loaded.",
        ChatError::SessionBusy => "Wait for the current reply to finish.",
        ChatError::NoChatSelected => "Start one with /new.",
        _ => "",
    };
    println!("\n  {} {error}", style("!").red().bold());
    if !hint.is_empty() {
        println!("  {}", style(hint).dim());
    }
    println!();
}
