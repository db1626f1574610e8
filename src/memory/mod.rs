//! Conversation memory
//!
//! Message types and history rendering shared by the conversational machine.
//! History is never truncated or summarized here.

pub mod store;

pub use store::{format_history, Message, MessageRole, EMPTY_HISTORY};
