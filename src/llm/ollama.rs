//! Ollama API client
//!
//! Non-streaming calls to a local Ollama server.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::llm::{GenerationOptions, LlmClient};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Reusable Ollama client (connection-pooled)
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(&config.ollama_base_url, config.ollama_model.clone(), config.request_timeout)
    }

    /// Check that the server answers and the configured model is installed
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            AgentError::LlmUnavailable(format!("Ollama is not reachable at {}: {}", self.base_url, e))
        })?;

        if !response.status().is_success() {
            return Err(AgentError::LlmUnavailable(format!(
                "Ollama returned {} for /api/tags",
                response.status()
            )));
        }

        let tags: TagsResponse = response.json().await.map_err(|e| {
            AgentError::LlmUnavailable(format!("Unexpected /api/tags response: {}", e))
        })?;

        if !tags.models.iter().any(|m| model_matches(&m.name, &self.model)) {
            return Err(AgentError::LlmUnavailable(format!(
                "model '{}' is not installed",
                self.model
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest::new(&self.model, prompt, options);

        debug!(
            model = %self.model,
            temperature = options.temperature,
            num_predict = ?options.max_output_tokens,
            "Calling Ollama"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Ollama request failed: {}", e);
                AgentError::Llm(format!("Ollama request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Ollama error response ({}): {}", status, error_text);
            return Err(AgentError::Llm(format!("Ollama returned {}: {}", status, error_text)));
        }

        let generated: GenerateResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Ollama response: {}", e);
            AgentError::Llm(format!("Ollama parse error: {}", e))
        })?;

        Ok(generated.response)
    }
}

/// `mistral` matches both `mistral` and `mistral:latest`
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || installed
            .strip_prefix(wanted)
            .is_some_and(|tag| tag.starts_with(':'))
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: ModelOptions,
}

impl<'a> GenerateRequest<'a> {
    fn new(model: &'a str, prompt: &'a str, options: GenerationOptions) -> Self {
        Self {
            model,
            prompt,
            stream: false,
            options: ModelOptions {
                temperature: options.temperature,
                num_predict: options.max_output_tokens,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ModelOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}
