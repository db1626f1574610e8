//! Core data models for the routing and conversational machines

use crate::error::AgentError;
use crate::memory::Message;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Enums =================
//

/// Which execution node the router selected
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Search,
    Calculator,
    Direct,
}

impl ToolChoice {
    pub const ALL: [ToolChoice; 3] = [ToolChoice::Search, ToolChoice::Calculator, ToolChoice::Direct];

    pub fn label(self) -> &'static str {
        match self {
            ToolChoice::Search => "search",
            ToolChoice::Calculator => "calculator",
            ToolChoice::Direct => "direct",
        }
    }

    /// Parse a raw router response. Only an exact label (after trim and
    /// lowercase) is accepted.
    pub fn from_label(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        Self::ALL.into_iter().find(|choice| choice.label() == normalized)
    }
}

/// Nodes of the routing machine, in the order they can be visited
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoutingNode {
    Router,
    Search,
    Calculator,
    Direct,
    Synthesizer,
}

impl From<ToolChoice> for RoutingNode {
    fn from(choice: ToolChoice) -> Self {
        match choice {
            ToolChoice::Search => RoutingNode::Search,
            ToolChoice::Calculator => RoutingNode::Calculator,
            ToolChoice::Direct => RoutingNode::Direct,
        }
    }
}

//
// ================= Routing State =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingState {
    pub question: String,
    pub tool_choice: Option<ToolChoice>,
    pub tool_output: Option<String>,
    pub final_answer: Option<String>,
    /// Nodes visited so far, in order
    #[serde(default)]
    pub trace: Vec<RoutingNode>,
}

/// Partial update produced by a single routing node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingUpdate {
    pub tool_choice: Option<ToolChoice>,
    pub tool_output: Option<String>,
    pub final_answer: Option<String>,
}

impl RoutingUpdate {
    pub fn tool_choice(choice: ToolChoice) -> Self {
        Self {
            tool_choice: Some(choice),
            ..Self::default()
        }
    }

    pub fn tool_output(output: impl Into<String>) -> Self {
        Self {
            tool_output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn final_answer(answer: impl Into<String>) -> Self {
        Self {
            final_answer: Some(answer.into()),
            ..Self::default()
        }
    }
}

impl RoutingState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            tool_choice: None,
            tool_output: None,
            final_answer: None,
            trace: Vec::new(),
        }
    }

    /// Merge a node's update. Every field is write-once.
    pub fn apply(&mut self, node: RoutingNode, update: RoutingUpdate) -> Result<()> {
        ensure_unset(&self.tool_choice, &update.tool_choice, "tool_choice")?;
        ensure_unset(&self.tool_output, &update.tool_output, "tool_output")?;
        ensure_unset(&self.final_answer, &update.final_answer, "final_answer")?;

        if update.tool_choice.is_some() {
            self.tool_choice = update.tool_choice;
        }
        if update.tool_output.is_some() {
            self.tool_output = update.tool_output;
        }
        if update.final_answer.is_some() {
            self.final_answer = update.final_answer;
        }
        self.trace.push(node);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.tool_choice.is_some() && self.tool_output.is_some() && self.final_answer.is_some()
    }
}

//
// ================= Conversation State =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub current_question: String,
    pub retrieved_context: Option<String>,
    pub answer: Option<String>,
}

/// Partial update produced by a single conversational node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationUpdate {
    pub retrieved_context: Option<String>,
    pub answer: Option<String>,
    pub messages: Option<Vec<Message>>,
}

impl ConversationState {
    pub fn new(messages: Vec<Message>, current_question: impl Into<String>) -> Self {
        Self {
            messages,
            current_question: current_question.into(),
            retrieved_context: None,
            answer: None,
        }
    }

    /// Merge a node's update. A replacement history must keep the current
    /// history as its prefix and add exactly one turn.
    pub fn apply(&mut self, update: ConversationUpdate) -> Result<()> {
        ensure_unset(&self.retrieved_context, &update.retrieved_context, "retrieved_context")?;
        ensure_unset(&self.answer, &update.answer, "answer")?;

        if let Some(messages) = &update.messages {
            if messages.len() != self.messages.len() + 2 || !messages.starts_with(&self.messages) {
                return Err(AgentError::InvalidTransition(format!(
                    "history update must append one turn to {} messages, got {}",
                    self.messages.len(),
                    messages.len()
                )));
            }
        }

        if update.retrieved_context.is_some() {
            self.retrieved_context = update.retrieved_context;
        }
        if update.answer.is_some() {
            self.answer = update.answer;
        }
        if let Some(messages) = update.messages {
            self.messages = messages;
        }
        Ok(())
    }
}

/// Every state field except the history is write-once
fn ensure_unset<T>(current: &Option<T>, incoming: &Option<T>, field: &str) -> Result<()> {
    if current.is_some() && incoming.is_some() {
        return Err(AgentError::InvalidTransition(format!("{} is already set", field)));
    }
    Ok(())
}

impl fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
