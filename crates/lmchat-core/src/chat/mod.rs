//! Chat persistence port and the session controller that coordinates it.

pub mod controller;
pub mod store;

pub use controller::{ChatSessionController, ChatSettings, SendOutcome, UserInput};
pub use store::ChatStore;
