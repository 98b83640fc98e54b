// Query orchestrator
// Routes a request to the debug or query branch and formats the answer

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::debugging::{DebugAnalysis, DebugHandler};
use crate::formatter::{FormattedResponse, format_response};
use crate::llm::{
    CompletionMode, StructuredResponse, TextCompletionProvider, completion_from_config,
    parse_structured,
};
use crate::retrieval::{Retrieval, RetrievalService};
use crate::search::{WebSearch, perform_search, search_from_config};
use crate::{CodexrError, Result};

pub const DEFAULT_TOP_K: usize = 3;

/// A query, an error log, or both
///
/// A non-blank error log takes the debug branch and the query is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantRequest {
    #[serde(default)]
    pub user_query: Option<String>,
    #[serde(default)]
    pub error_logs: Option<String>,
}

impl AssistantRequest {
    #[inline]
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            user_query: Some(text.into()),
            error_logs: None,
        }
    }

    #[inline]
    pub fn error_log(text: impl Into<String>) -> Self {
        Self {
            user_query: None,
            error_logs: Some(text.into()),
        }
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

pub struct Orchestrator {
    retrieval: Arc<RetrievalService>,
    backend: Arc<dyn TextCompletionProvider>,
    search: Arc<dyn WebSearch>,
    debugger: DebugHandler,
    top_k: usize,
}

impl Orchestrator {
    #[inline]
    pub fn new(
        retrieval: Arc<RetrievalService>,
        backend: Arc<dyn TextCompletionProvider>,
        search: Arc<dyn WebSearch>,
    ) -> Self {
        Self {
            retrieval,
            debugger: DebugHandler::new(Arc::clone(&backend)),
            backend,
            search,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Wire up the configured backends around a shared retrieval service
    #[inline]
    pub fn from_config(
        config: &Config,
        retrieval: Arc<RetrievalService>,
        model: Option<&str>,
    ) -> Result<Self> {
        let backend = completion_from_config(config, model)?;
        let search = search_from_config(&config.search);
        Ok(Self::new(retrieval, backend, search).with_top_k(config.retrieval.top_k))
    }

    #[inline]
    pub fn retrieval(&self) -> &Arc<RetrievalService> {
        &self.retrieval
    }

    #[inline]
    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Answer one request
    ///
    /// Fails only when neither a query nor an error log was given. Every
    /// backend failure after that is folded into the response.
    #[inline]
    pub async fn handle(&self, request: AssistantRequest) -> Result<FormattedResponse> {
        if let Some(error_log) = non_blank(request.error_logs.as_ref()) {
            return Ok(self.handle_error_log(error_log).await);
        }
        if let Some(query) = non_blank(request.user_query.as_ref()) {
            return Ok(self.handle_query(query).await);
        }
        Err(CodexrError::Input(
            "Please enter a query or error logs (or upload audio).".to_string(),
        ))
    }

    async fn handle_error_log(&self, error_log: &str) -> FormattedResponse {
        info!("Analyzing error log ({} chars)", error_log.len());
        let debugger = self.debugger.clone();
        let log = error_log.to_string();
        let analysis = tokio::task::spawn_blocking(move || debugger.analyze_error(&log))
            .await
            .unwrap_or_else(|e| {
                DebugAnalysis::degraded(error_log, format!("task failed: {}", e))
            });

        format_response(&StructuredResponse::default(), None, Some(&analysis), None)
    }

    async fn handle_query(&self, query: &str) -> FormattedResponse {
        info!("Answering query: {}", query);

        // Only real passages reach the prompt; the sentinel and errors are for display
        let (prompt, retrieved_docs) = match self.retrieval.retrieve(query, self.top_k).await {
            Ok(Retrieval::Passages(passages)) => (build_prompt(query, &passages), passages),
            Ok(missing @ Retrieval::IndexMissing) => (build_prompt(query, &[]), missing.into_docs()),
            Err(e) => {
                warn!("Retrieval failed: {}", e);
                (build_prompt(query, &[]), vec![format!("Error: {}", e)])
            }
        };

        let (structured, search_results) = tokio::join!(self.complete(prompt), self.search(query));

        format_response(
            &structured,
            Some(&search_results),
            None,
            Some(&retrieved_docs),
        )
    }

    async fn complete(&self, prompt: String) -> StructuredResponse {
        let backend = Arc::clone(&self.backend);
        let reply =
            tokio::task::spawn_blocking(move || backend.complete(&prompt, CompletionMode::Normal))
                .await;

        match reply {
            Ok(Ok(reply)) => {
                debug!("Backend replied with {} chars", reply.len());
                parse_structured(&reply)
            }
            Ok(Err(e)) => {
                warn!("Completion failed: {:#}", e);
                StructuredResponse::from_error(format!("{:#}", e))
            }
            Err(e) => {
                warn!("Completion task failed: {}", e);
                StructuredResponse::from_error(e.to_string())
            }
        }
    }

    async fn search(&self, query: &str) -> Value {
        let search = Arc::clone(&self.search);
        let query = query.to_string();
        tokio::task::spawn_blocking(move || perform_search(search.as_ref(), &query))
            .await
            .unwrap_or_else(|e| json!({ "search_result": format!("Error: {}", e) }))
    }
}

/// The query followed by any retrieved passages as context
#[inline]
pub fn build_prompt(query: &str, passages: &[String]) -> String {
    if passages.is_empty() {
        return query.to_string();
    }

    let context = passages
        .iter()
        .enumerate()
        .map(|(i, passage)| format!("[{}] {}", i + 1, passage))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\nContext:\n{}", query, context)
}
