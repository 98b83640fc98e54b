// Web search module
// SerpAPI client and the never-failing search wrapper used by the orchestrator

#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;

const NO_RESULT: &str = "No good search result found";

/// A black-box web search capability
pub trait WebSearch: Send + Sync {
    /// Short text answer for `query`
    fn search(&self, query: &str) -> Result<String>;
}

/// Run `query` and wrap the outcome as `{"search_result": ...}`
///
/// Failures become an `"Error: ..."` string, so this never fails.
#[inline]
pub fn perform_search(search: &dyn WebSearch, query: &str) -> Value {
    match search.search(query) {
        Ok(result) => json!({ "search_result": result }),
        Err(e) => {
            warn!("Web search failed: {:#}", e);
            json!({ "search_result": format!("Error: {:#}", e) })
        }
    }
}

/// Build the configured search backend
#[inline]
pub fn search_from_config(config: &SearchConfig) -> Arc<dyn WebSearch> {
    match config.resolved_api_key() {
        Some(api_key) => {
            info!("Web search enabled via {}", config.endpoint);
            Arc::new(SerpApiClient::new(config, api_key))
        }
        None => {
            info!("No SerpAPI key configured, web search disabled");
            Arc::new(DisabledSearch)
        }
    }
}

/// Stand-in used when no API key is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSearch;

impl WebSearch for DisabledSearch {
    fn search(&self, _query: &str) -> Result<String> {
        Err(anyhow!(
            "web search is not configured (set search.api_key or SERPAPI_API_KEY)"
        ))
    }
}

/// SerpAPI `search.json` client
pub struct SerpApiClient {
    agent: ureq::Agent,
    endpoint: String,
    engine: String,
    api_key: String,
}

impl std::fmt::Debug for SerpApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerpApiClient")
            .field("endpoint", &self.endpoint)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl SerpApiClient {
    #[inline]
    pub fn new(config: &SearchConfig, api_key: impl Into<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Self {
            agent,
            endpoint: config.endpoint.clone(),
            engine: config.engine.clone(),
            api_key: api_key.into(),
        }
    }
}

impl WebSearch for SerpApiClient {
    fn search(&self, query: &str) -> Result<String> {
        debug!("Searching {} for '{}'", self.endpoint, query);

        let body = self
            .agent
            .get(&self.endpoint)
            .query("q", query)
            .query("engine", &self.engine)
            .query("api_key", &self.api_key)
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => anyhow!("HTTP error {}", status),
                other => anyhow!(other),
            })
            .context("SerpAPI request failed")?;

        let response: Value =
            serde_json::from_str(&body).context("Failed to parse SerpAPI response")?;
        summarize_results(&response)
    }
}

/// Pick the most direct answer out of a SerpAPI response
fn summarize_results(response: &Value) -> Result<String> {
    if let Some(error) = response.get("error").and_then(Value::as_str) {
        return Err(anyhow!("SerpAPI error: {}", error));
    }

    let answer_box = &response["answer_box"];
    for key in ["answer", "snippet"] {
        if let Some(text) = answer_box.get(key).and_then(Value::as_str) {
            return Ok(text.to_string());
        }
    }

    if let Some(description) = response["knowledge_graph"]
        .get("description")
        .and_then(Value::as_str)
    {
        return Ok(description.to_string());
    }

    let snippets: Vec<&str> = response["organic_results"]
        .as_array()
        .map(|results| {
            results
                .iter()
                .filter_map(|result| result.get("snippet").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if snippets.is_empty() {
        Ok(NO_RESULT.to_string())
    } else {
        Ok(snippets.join("\n"))
    }
}
