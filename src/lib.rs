//! Tool-Routing Agent
//!
//! A question-answering agent that:
//! - Lets an LLM route each question to web search, a calculator, or a
//!   direct answer
//! - Runs exactly one tool and synthesizes the final answer from its output
//! - Offers a conversational mode that carries memory across turns
//!
//! ROUTING LOOP:
//! QUESTION → ROUTE → {SEARCH | CALCULATE | DIRECT} → SYNTHESIZE
//!
//! CONVERSATION LOOP:
//! QUESTION → RETRIEVE CONTEXT → ANSWER → UPDATE MEMORY

pub mod agent;
pub mod config;
pub mod conversational;
pub mod error;
pub mod llm;
pub mod memory;
pub mod models;
pub mod prompts;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use agent::RoutingAgent;
pub use config::AgentConfig;
pub use conversational::ConversationalAgent;
pub use llm::{LlmClient, OllamaClient};
pub use memory::{Message, MessageRole};
pub use models::*;
