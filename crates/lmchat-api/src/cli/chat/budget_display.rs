//! Context budget and reply stats formatting for the chat loop.
//!
//! Colors change at the 80% threshold to show how close the conversation is
//! to the context window.

use console::style;

use lmchat_core::stream::SessionStats;

/// Format a token count with thousands separators (`12450` -> `12,450`).
pub fn format_tokens_human(n: u32) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Context counter: `  [context: 1,204 / 4,096 tokens]`.
///
/// Yellow when at least 80% of the window is used, dim otherwise.
pub fn render_context_counter(used: u32, total: u32) -> String {
    let percentage = if total == 0 {
        100.0
    } else {
        used as f64 / total as f64 * 100.0
    };
    let text = format!(
        "  [context: {} / {} tokens]",
        format_tokens_human(used),
        format_tokens_human(total),
    );

    if percentage >= 80.0 {
        format!("{}", style(text).yellow())
    } else {
        format!("{}", style(text).dim())
    }
}

/// Notice shown when older messages were left out of the request.
///
/// Returns `None` when the whole conversation fit.
pub fn render_trimmed_notice(sent: usize, total: usize) -> Option<String> {
    if sent >= total {
        return None;
    }
    let dropped = total - sent;
    Some(format!(
        "  {} {}",
        style("~").yellow().bold(),
        style(format!(
            "{dropped} older message{} left out to fit the context window",
            if dropped == 1 { "" } else { "s" }
        ))
        .yellow()
    ))
}

/// Footer after a completed reply:
/// `  | 1,204 context tokens · max 2,892 · 3.4s · model`
pub fn render_completion_stats(stats: &SessionStats, model: &str) -> String {
    let mut line = format!(
        "| {} context tokens \u{00b7} max {} \u{00b7} {:.1}s \u{00b7} {}",
        format_tokens_human(stats.tokens_consumed),
        format_tokens_human(stats.max_tokens),
        stats.elapsed.as_secs_f64(),
        model,
    );
    if stats.malformed_chunks > 0 {
        line.push_str(&format!(
            " \u{00b7} {} malformed chunk{} skipped",
            stats.malformed_chunks,
            if stats.malformed_chunks == 1 { "" } else { "s" }
        ));
    }
    format!("  {}", style(line).dim())
}
