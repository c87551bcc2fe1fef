//! `lmchat models`: list what the model service offers.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use lmchat_infra::llm::sorted_models;

use super::spinner;
use crate::state::AppState;

pub async fn list_models(state: &AppState, json: bool) -> Result<()> {
    let progress = spinner(format!("Querying {}...", state.config.model.base_url));
    let result = sorted_models(&state.client).await;
    progress.finish_and_clear();

    let models = match result {
        Ok(models) => models,
        Err(e) => {
            anyhow::bail!(
                "could not list models from {} ({}): {e}",
                state.config.model.base_url,
                state.client.name()
            );
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    if models.is_empty() {
        println!();
        println!(
            "  {} The server reported no models. Load one in your model server first.",
            style("i").blue().bold()
        );
        println!();
        return Ok(());
    }

    let current = state.model();
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Model").fg(Color::White),
        Cell::new("Owner").fg(Color::White),
    ]);

    for model in &models {
        let name = if model.id == current {
            Cell::new(format!("● {}", model.id)).fg(Color::Green)
        } else {
            Cell::new(&model.id).fg(Color::Cyan)
        };
        table.add_row(vec![
            name,
            Cell::new(model.owned_by.as_deref().unwrap_or("-")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} model{} at {}",
        style(models.len()).bold(),
        if models.len() == 1 { "" } else { "s" },
        style(&state.config.model.base_url).dim()
    );
    println!();
    Ok(())
}
