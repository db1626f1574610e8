//! Environment configuration
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file by the binary before [`AgentConfig::from_env`] is called.

use crate::error::AgentError;
use crate::Result;
use std::env;
use std::time::Duration;

pub const DEFAULT_OLLAMA_MODEL: &str = "mistral";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub tavily_api_key: Option<String>,
    pub ollama_model: String,
    pub ollama_base_url: String,
    pub request_timeout: Duration,
    pub debug: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            debug: false,
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();

        let request_timeout = match get("OLLAMA_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    AgentError::Config(format!("OLLAMA_TIMEOUT_SECS must be a number of seconds, got '{}'", raw))
                })?;
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };

        Ok(Self {
            tavily_api_key: get("TAVILY_API_KEY"),
            ollama_model: get("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            ollama_base_url: get("OLLAMA_BASE_URL").unwrap_or(defaults.ollama_base_url),
            request_timeout,
            debug: get("DEBUG").is_some_and(|v| v.eq_ignore_ascii_case("true")),
        })
    }

    /// Configuration problems that degrade, but do not stop, the agent
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.tavily_api_key.is_none() {
            issues.push("TAVILY_API_KEY not set in .env file".to_string());
        }

        issues
    }
}
