//! Async readline input handling for the chat loop.
//!
//! A `rustyline_async::Readline` is created per line and dropped as soon as
//! the line is read. Raw mode is therefore only held while the prompt is
//! showing, so Ctrl+C reaches the process as SIGINT while a reply streams.

use std::io::Write;

use console::style;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use rustyline_async::{Readline, ReadlineError, ReadlineEvent};

/// Events produced by the input handler.
#[derive(Debug, PartialEq)]
pub enum InputEvent {
    /// User submitted a line (trimmed).
    Message(String),
    /// End of file (Ctrl+D).
    Eof,
    /// Interrupt signal (Ctrl+C) at the prompt.
    Interrupted,
}

/// Prompt text, showing a marker while an image is attached.
pub fn prompt_for(has_image: bool) -> String {
    if has_image {
        format!("  {} {} ", style("[img]").magenta(), style("You >").green().bold())
    } else {
        format!("  {} ", style("You >").green().bold())
    }
}

/// Async input handler.
pub struct ChatInput {
    prompt: String,
}

impl ChatInput {
    pub fn new(prompt: String) -> Self {
        Self { prompt }
    }

    /// Update the prompt displayed to the user.
    pub fn update_prompt(&mut self, prompt: String) {
        self.prompt = prompt;
    }

    /// Read a line of input.
    pub async fn read_line(&mut self) -> Result<InputEvent, ReadlineError> {
        let (mut rl, _writer) = Readline::new(self.prompt.clone())?;
        let event = match rl.readline().await {
            Ok(ReadlineEvent::Line(line)) => InputEvent::Message(line.trim().to_string()),
            Ok(ReadlineEvent::Eof) => InputEvent::Eof,
            Ok(ReadlineEvent::Interrupted) => InputEvent::Interrupted,
            Err(e) => {
                tracing::debug!(error = %e, "readline failed, treating as EOF");
                InputEvent::Eof
            }
        };
        let _ = rl.flush();
        Ok(event)
    }

    /// Clear the terminal screen.
    pub fn clear(&self) {
        let mut stdout = std::io::stdout();
        let _ = execute!(stdout, Clear(ClearType::All), MoveTo(0, 0));
        let _ = stdout.flush();
    }
}
