//! Error types for the tool-routing agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Prompt template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}
