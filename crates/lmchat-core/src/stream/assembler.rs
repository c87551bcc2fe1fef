//! Folds decoded stream events into one evolving assistant draft.
//!
//! The assembler produces values, not mutations: every applied event yields
//! the next snapshot, which observers may render as partial progress.

use lmchat_types::chat::AssistantDraft;
use lmchat_types::llm::StreamEvent;

/// Outcome of applying one event to a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The draft changed; publish the new snapshot.
    Updated(AssistantDraft),
    /// Nothing changed (malformed chunk).
    Unchanged(AssistantDraft),
    /// The terminator arrived; the draft is final.
    Finished(AssistantDraft),
}

impl Applied {
    pub fn draft(&self) -> &AssistantDraft {
        match self {
            Applied::Updated(d) | Applied::Unchanged(d) | Applied::Finished(d) => d,
        }
    }

    pub fn into_draft(self) -> AssistantDraft {
        match self {
            Applied::Updated(d) | Applied::Unchanged(d) | Applied::Finished(d) => d,
        }
    }
}

pub struct MessageAssembler;

impl MessageAssembler {
    /// An empty assistant draft.
    pub fn initial() -> AssistantDraft {
        AssistantDraft::default()
    }

    pub fn apply(mut draft: AssistantDraft, event: &StreamEvent) -> Applied {
        match event {
            StreamEvent::DeltaText { text } => {
                draft.content.push_str(text);
                Applied::Updated(draft)
            }
            StreamEvent::DeltaImage { uri } => {
                // at most one image per message, last write wins
                draft.image = Some(uri.clone());
                Applied::Updated(draft)
            }
            StreamEvent::Malformed { .. } => Applied::Unchanged(draft),
            StreamEvent::Done => Applied::Finished(draft),
        }
    }

    /// Fold a whole event sequence, stopping at the terminator.
    pub fn fold<'a>(events: impl IntoIterator<Item = &'a StreamEvent>) -> AssistantDraft {
        let mut draft = Self::initial();
        for event in events {
            match Self::apply(draft, event) {
                Applied::Finished(d) => return d,
                other => draft = other.into_draft(),
            }
        }
        draft
    }
}
