//! Web search adapter (Tavily)
//!
//! Searches never fail: missing credentials, empty queries and transport
//! errors all come back as readable text for the synthesizer.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MAX_RESULTS: usize = 3;
pub const NO_RESULTS: &str = "No results found.";

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// Query → formatted snippets
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> String;
}

enum ClientState {
    Ready {
        client: Client,
        api_key: String,
        endpoint: Url,
    },
    MissingKey,
    InitFailed(String),
}

pub struct TavilySearch {
    state: ClientState,
}

impl TavilySearch {
    /// Construction never fails; an unusable adapter reports why on every search.
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_endpoint(api_key, TAVILY_SEARCH_URL)
    }

    /// Search against a Tavily-compatible endpoint other than the public API
    pub fn with_endpoint(api_key: Option<String>, endpoint: &str) -> Self {
        let state = match api_key.filter(|k| !k.trim().is_empty()) {
            None => ClientState::MissingKey,
            Some(api_key) => match build_client(endpoint) {
                Ok((client, endpoint)) => ClientState::Ready {
                    client,
                    api_key,
                    endpoint,
                },
                Err(reason) => {
                    warn!("Failed to build search client: {}", reason);
                    ClientState::InitFailed(reason)
                }
            },
        };

        Self { state }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, ClientState::Ready { .. })
    }
}

fn build_client(endpoint: &str) -> Result<(Client, Url), String> {
    let endpoint = Url::parse(endpoint).map_err(|e| format!("invalid endpoint {:?}: {}", endpoint, e))?;
    let client = Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| e.to_string())?;
    Ok((client, endpoint))
}

async fn post_search(
    client: &Client,
    endpoint: &Url,
    api_key: &str,
    query: &str,
    max_results: usize,
) -> Result<Vec<SearchHit>, String> {
    let request = TavilyRequest {
        api_key,
        query,
        max_results,
        search_depth: "basic",
    };

    let response = client
        .post(endpoint.clone())
        .json(&request)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("Tavily returned {}: {}", status, body));
    }

    let parsed: TavilyResponse = response.json().await.map_err(|e| e.to_string())?;
    Ok(parsed.results)
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> String {
        if query.trim().is_empty() {
            return "Search unavailable: empty query.".to_string();
        }

        let (client, api_key, endpoint) = match &self.state {
            ClientState::Ready {
                client,
                api_key,
                endpoint,
            } => (client, api_key, endpoint),
            ClientState::MissingKey => {
                return "Search unavailable: TAVILY_API_KEY is not configured.".to_string();
            }
            ClientState::InitFailed(reason) => {
                return format!("Search unavailable: search client failed to initialize ({}).", reason);
            }
        };

        debug!(query = %query, max_results, "Searching the web");

        match post_search(client, endpoint, api_key, query, max_results).await {
            Ok(hits) => {
                debug!(hits = hits.len(), "Search complete");
                format_results(&hits)
            }
            Err(e) => {
                warn!("Search failed: {}", e);
                format!("Search error: {}", e)
            }
        }
    }
}

/// Numbered `Title`/`Content`/`URL` blocks; missing fields render as `N/A`
pub fn format_results(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_RESULTS.to_string();
    }

    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[Result {}]\nTitle: {}\nContent: {}\nURL: {}\n",
                i + 1,
                hit.title.as_deref().unwrap_or("N/A"),
                hit.content.as_deref().unwrap_or("N/A"),
                hit.url.as_deref().unwrap_or("N/A"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
}
