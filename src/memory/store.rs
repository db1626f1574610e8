//! Conversation history entries
//!
//! Messages are plain values; the conversational machine copies the history
//! it receives and hands back an extended copy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single message in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Placeholder rendered in prompts when there is no history yet
pub const EMPTY_HISTORY: &str = "No previous messages.";

/// Render history as `Role: content` lines for LLM prompts
pub fn format_history(messages: &[Message]) -> String {
    if messages.is_empty() {
        return EMPTY_HISTORY.to_string();
    }

    messages
        .iter()
        .map(|msg| format!("{}: {}", msg.role, msg.content))
        .collect::<Vec<_>>()
        .join("\n")
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        };
        write!(f, "{}", s)
    }
}
