//! Token cost estimation for outgoing messages.
//!
//! Uses a character-count heuristic (~4 characters per token). It is not a
//! tokenizer, only a stable, monotonic approximation for budgeting.

use serde::Serialize;

use lmchat_types::chat::{Message, MessageRole};

/// Characters per estimated token.
const CHARS_PER_TOKEN: u32 = 4;

/// Flat cost charged for an attached image, in place of its payload.
pub const IMAGE_TOKEN_SURCHARGE: u32 = 85;

/// Estimate the token count of a piece of text.
///
/// `ceil(chars / 4)`; the empty string costs nothing.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// The text-only projection of a message that gets costed.
#[derive(Serialize)]
struct Costed<'a> {
    role: MessageRole,
    content: Option<&'a str>,
}

/// Estimate the token cost of a message as it will be serialized.
///
/// The image reference is never part of the counted text. A data URI can be
/// megabytes long, so attached images are charged [`IMAGE_TOKEN_SURCHARGE`].
pub fn estimate_message(message: &Message) -> u32 {
    let costed = Costed {
        role: message.role,
        content: message.content.as_deref(),
    };
    // Serializing a struct of a unit enum and an optional str cannot fail.
    let serialized = serde_json::to_string(&costed).unwrap_or_default();
    let surcharge = if message.image.is_some() {
        IMAGE_TOKEN_SURCHARGE
    } else {
        0
    };
    estimate_tokens(&serialized) + surcharge
}
