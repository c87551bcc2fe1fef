//! Context-window management: token estimation and history budgeting.

pub mod budgeter;
pub mod estimator;

pub use budgeter::{BudgetSelection, ContextBudgeter};
pub use estimator::{estimate_message, estimate_tokens, IMAGE_TOKEN_SURCHARGE};
