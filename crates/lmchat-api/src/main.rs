//! lmchat CLI and REST API entry point.
//!
//! Binary name: `lmchat`
//!
//! Parses CLI arguments, sets up tracing, then dispatches to the interactive
//! chat, chat management commands, model listing, or the REST server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{ChatsCommand, Cli, Commands};
use state::{AppState, Overrides, ServerState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive = lmchat_observe::default_directive(cli.verbose, cli.quiet);
    lmchat_observe::init_tracing(directive, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    lmchat_observe::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "lmchat", &mut std::io::stdout());
        return Ok(());
    }

    let overrides = Overrides {
        model: cli.model.clone(),
        base_url: cli.base_url.clone(),
    };

    match cli.command {
        Commands::Chat { chat, new } => {
            let state = AppState::init(&overrides).await?;
            cli::chat::loop_runner::run_chat_loop(state, chat, new).await?;
        }

        Commands::Chats { action } => {
            let state = AppState::init(&overrides).await?;
            match action {
                ChatsCommand::List => cli::chats::list_chats(&state, cli.json).await?,
                ChatsCommand::New { title } => cli::chats::new_chat(&state, title, cli.json).await?,
                ChatsCommand::Show { id } => cli::chats::show_chat(&state, id, cli.json).await?,
                ChatsCommand::Rename { id, title } => {
                    cli::chats::rename_chat(&state, id, &title, cli.json).await?;
                }
                ChatsCommand::Delete { id, force } => {
                    cli::chats::delete_chat(&state, id, force, cli.json).await?;
                }
            }
        }

        Commands::Models => {
            let state = AppState::init(&overrides).await?;
            cli::models::list_models(&state, cli.json).await?;
        }

        Commands::Serve { port, host } => {
            let state = ServerState::init().await?;

            // Ensure an API key exists, print it if new
            if let Some(api_key) = http::extractors::auth::ensure_api_key(&state).await? {
                println!();
                println!(
                    "  {} API key generated (save this, it won't be shown again):",
                    console::style("🔑").bold()
                );
                println!();
                println!("  {}", console::style(&api_key).yellow().bold());
                println!();
            }

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!(
                "  {} lmchat API listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            println!("\n  Server stopped.");
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
