//! Language-model client trait and implementations
//!
//! Every routing and conversational node talks to the model through
//! [`LlmClient`]. The client is injected into each machine, so tests swap in
//! [`ScriptedLlm`] instead of a live Ollama server.

use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub mod ollama;
pub use ollama::OllamaClient;

/// Sampling options for a single generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    /// Upper bound on generated tokens (`None` leaves the model default)
    pub max_output_tokens: Option<u32>,
}

impl GenerationOptions {
    pub const fn new(temperature: f32) -> Self {
        Self {
            temperature,
            max_output_tokens: None,
        }
    }

    pub const fn capped(temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            max_output_tokens: Some(max_output_tokens),
        }
    }
}

/// Router: near-deterministic, one word
pub const ROUTER_OPTIONS: GenerationOptions = GenerationOptions::capped(0.1, 10);
pub const EXTRACTION_OPTIONS: GenerationOptions = GenerationOptions::new(0.1);
pub const DIRECT_OPTIONS: GenerationOptions = GenerationOptions::new(0.7);
pub const SYNTHESIS_OPTIONS: GenerationOptions = GenerationOptions::new(0.5);
pub const CONTEXT_OPTIONS: GenerationOptions = GenerationOptions::capped(0.2, 150);
pub const CONVERSATION_OPTIONS: GenerationOptions = GenerationOptions::new(0.4);

/// Text-completion backend
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier sent with each request
    fn model(&self) -> &str;

    /// Generate a completion for `prompt`. Transport and model errors are
    /// returned as-is; there is no retry.
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String>;
}

enum Reply {
    Text(String),
    Fail(String),
}

/// Deterministic client for development & testing
///
/// Responds by matching prompt substrings against registered rules, first
/// match wins. Records every prompt it receives.
pub struct ScriptedLlm {
    rules: Vec<(String, Reply)>,
    fallback: Reply,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, GenerationOptions)>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Reply::Text(String::new()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `response` to prompts containing `marker`
    pub fn on(mut self, marker: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push((marker.into(), Reply::Text(response.into())));
        self
    }

    /// Fail prompts containing `marker` with an LLM error
    pub fn fail_on(mut self, marker: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push((marker.into(), Reply::Fail(message.into())));
        self
    }

    /// Reply used when no rule matches
    pub fn otherwise(mut self, response: impl Into<String>) -> Self {
        self.fallback = Reply::Text(response.into());
        self
    }

    /// Fail every prompt that no rule matches
    pub fn otherwise_fail(mut self, message: impl Into<String>) -> Self {
        self.fallback = Reply::Fail(message.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, with the options they were sent with
    pub fn prompts(&self) -> Vec<(String, GenerationOptions)> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((prompt.to_string(), options));

        let reply = self
            .rules
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, reply)| reply)
            .unwrap_or(&self.fallback);

        match reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(message) => Err(AgentError::Llm(message.clone())),
        }
    }
}
