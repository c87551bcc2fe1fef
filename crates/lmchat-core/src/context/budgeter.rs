//! Context-window budgeting.
//!
//! Selects the most recent contiguous run of conversation turns whose
//! estimated cost fits `Budget::max_context_tokens`, and derives how many
//! tokens may be requested for the response.

use lmchat_types::chat::Message;
use lmchat_types::llm::Budget;

use super::estimator::estimate_message;

/// Result of budgeting a conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetSelection {
    /// Contiguous suffix of the history, oldest first.
    pub messages: Vec<Message>,
    /// Summed estimate of the selected messages.
    pub tokens_consumed: u32,
    /// True when the newest message alone exceeded the context ceiling
    /// and was sent anyway.
    pub forced: bool,
}

impl BudgetSelection {
    /// `max_tokens` to request: whatever the total budget leaves, capped at
    /// the response ceiling.
    pub fn response_tokens(&self, budget: &Budget) -> u32 {
        budget
            .max_total_tokens
            .saturating_sub(self.tokens_consumed)
            .min(budget.max_response_tokens)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Suffix selector over a conversation history.
///
/// Total over its inputs: never fails, and never returns an empty
/// selection for a non-empty history.
pub struct ContextBudgeter;

impl ContextBudgeter {
    pub fn select(history: &[Message], budget: &Budget) -> BudgetSelection {
        let mut consumed: u32 = 0;
        let mut start = history.len();

        for (idx, message) in history.iter().enumerate().rev() {
            let cost = estimate_message(message);
            match consumed.checked_add(cost) {
                Some(total) if total <= budget.max_context_tokens => {
                    consumed = total;
                    start = idx;
                }
                _ => break,
            }
        }

        let mut forced = false;
        if start == history.len() {
            if let Some(newest) = history.last() {
                consumed = estimate_message(newest);
                start = history.len() - 1;
                forced = true;
            }
        }

        let selected = &history[start..];
        if start > 0 {
            tracing::debug!(
                dropped = start,
                kept = selected.len(),
                tokens = consumed,
                "trimmed conversation history to fit context budget"
            );
        }

        BudgetSelection {
            messages: selected.to_vec(),
            tokens_consumed: consumed,
            forced,
        }
    }
}
