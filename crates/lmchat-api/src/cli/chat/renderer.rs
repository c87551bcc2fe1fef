//! Terminal markdown rendering with syntax-highlighted code blocks.
//!
//! `ChatRenderer` combines `termimad` for prose and `syntect` for code block
//! syntax highlighting. During streaming, text is printed raw as it arrives;
//! stored replies (e.g. `/history`) are rendered as formatted markdown.

use std::io::Write;

use syntect::easy::HighlightLines;
use syntect::highlighting::{Style, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;
use termimad::crossterm::style::Color;
use termimad::MadSkin;

/// Terminal markdown renderer with syntax highlighting.
pub struct ChatRenderer {
    skin: MadSkin,
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl Default for ChatRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatRenderer {
    pub fn new() -> Self {
        let mut skin = MadSkin::default_dark();
        skin.bold.set_fg(Color::Cyan);
        skin.headers[0].set_fg(Color::Cyan);
        skin.headers[1].set_fg(Color::Cyan);
        skin.inline_code.set_fg(Color::Yellow);

        Self {
            skin,
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    /// Render a complete markdown reply with syntax-highlighted code blocks.
    pub fn render_final(&self, markdown: &str) -> String {
        let mut output = String::new();
        let mut in_code_block = false;
        let mut code_lang = String::new();
        let mut code_buf = String::new();

        for line in markdown.lines() {
            let fence = line.trim_start().starts_with("```");
            if fence && !in_code_block {
                in_code_block = true;
                code_lang = line.trim().trim_start_matches('`').trim().to_string();
                code_buf.clear();
            } else if fence {
                in_code_block = false;
                output.push_str(&self.highlight_code(&code_buf, &code_lang));
            } else if in_code_block {
                code_buf.push_str(line);
                code_buf.push('\n');
            } else {
                output.push_str(&self.skin.term_text(line).to_string());
            }
        }

        // Unclosed fence at the end of a cut-off reply.
        if in_code_block && !code_buf.is_empty() {
            output.push_str(&self.highlight_code(&code_buf, &code_lang));
        }

        output
    }

    /// Print a chunk of streamed text (raw, no formatting).
    pub fn print_streaming_text(&self, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn highlight_code(&self, code: &str, lang: &str) -> String {
        let syntax = if lang.is_empty() {
            self.syntax_set.find_syntax_plain_text()
        } else {
            self.syntax_set
                .find_syntax_by_token(lang)
                .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text())
        };

        let mut output = String::new();
        output.push_str(&format!("  {}\n", console::style(format!("--- {lang} ---")).dim()));

        let Some(theme) = self.theme_set.themes.get("base16-ocean.dark") else {
            for line in code.lines() {
                output.push_str(&format!("  {line}\n"));
            }
            return output;
        };
        let mut h = HighlightLines::new(syntax, theme);

        for line in code.lines() {
            let ranges: Vec<(Style, &str)> = h
                .highlight_line(line, &self.syntax_set)
                .unwrap_or_default();
            let escaped = as_24_bit_terminal_escaped(&ranges[..], false);
            output.push_str(&format!("  {escaped}\x1b[0m\n"));
        }

        output
    }
}

/// Tracks how much of a growing draft has been printed.
///
/// Draft snapshots are cumulative; each one only needs its unseen suffix
/// printed. Snapshots may be skipped, so the suffix can span several deltas.
#[derive(Debug, Default)]
pub struct DraftPrinter {
    printed: usize,
    image_shown: bool,
}

impl DraftPrinter {
    /// The part of `content` not yet printed, advancing the cursor.
    pub fn unseen<'a>(&mut self, content: &'a str) -> &'a str {
        let suffix = content.get(self.printed..).unwrap_or("");
        self.printed = content.len();
        suffix
    }

    /// True the first time an image reference appears.
    pub fn first_image(&mut self, image: Option<&str>) -> bool {
        if image.is_some() && !self.image_shown {
            self.image_shown = true;
            return true;
        }
        false
    }

    pub fn has_output(&self) -> bool {
        self.printed > 0 || self.image_shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_printer_prints_only_new_suffix() {
        let mut printer = DraftPrinter::default();
        assert!(!printer.has_output());
        assert_eq!(printer.unseen("Hel"), "Hel");
        assert_eq!(printer.unseen("Hello th"), "lo th");
        assert_eq!(printer.unseen("Hello th"), "");
        assert_eq!(printer.unseen("Hello there"), "ere");
        assert!(printer.has_output());
    }

    #[test]
    fn draft_printer_handles_multibyte_text() {
        let mut printer = DraftPrinter::default();
        assert_eq!(printer.unseen("caf"), "caf");
        assert_eq!(printer.unseen("café ☕"), "é ☕");
    }

    #[test]
    fn draft_printer_reports_image_once() {
        let mut printer = DraftPrinter::default();
        assert!(!printer.first_image(None));
        assert!(printer.first_image(Some("https://x/y.png")));
        assert!(!printer.first_image(Some("https://x/y.png")));
    }

    #[test]
    fn render_final_highlights_code_fences() {
        let renderer = ChatRenderer::new();
        let out = renderer.render_final("Here:\n```rust\nfn main() {}\n```\n");
        assert!(out.contains("--- rust ---"));
        assert!(out.contains("main"));
    }

    #[test]
    fn render_final_closes_unterminated_fence() {
        let renderer = ChatRenderer::new();
        let out = renderer.render_final("```python\nprint('hi')");
        assert!(out.contains("--- python ---"));
        assert!(out.contains("print"));
    }
}
