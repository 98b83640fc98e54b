// Language model module
// Text-completion backends and parsing of their replies

pub mod ollama;


use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::Result;
use crate::config::{CompletionBackend, Config};

pub use ollama::OllamaCompletion;

/// How the backend should treat a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    /// Answer a coding question
    Normal,
    /// Explain an error log
    Debug,
}

impl fmt::Display for CompletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal Mode"),
            Self::Debug => write!(f, "Debug Mode"),
        }
    }
}

/// A black-box text-completion service
pub trait TextCompletionProvider: Send + Sync {
    /// Name of the model answering, as shown to users
    fn model(&self) -> &str;

    fn complete(&self, prompt: &str, mode: CompletionMode) -> anyhow::Result<String>;
}

/// Canned replies that echo the prompt; needs no network access
#[derive(Debug, Clone)]
pub struct PlaceholderCompletion {
    model: String,
}

impl PlaceholderCompletion {
    #[inline]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl TextCompletionProvider for PlaceholderCompletion {
    fn model(&self) -> &str {
        &self.model
    }

    fn complete(&self, prompt: &str, mode: CompletionMode) -> anyhow::Result<String> {
        Ok(format!("[{}] {} response for '{}'", self.model, mode, prompt))
    }
}

/// Build the configured backend; `model` overrides the configured model name
#[inline]
pub fn completion_from_config(
    config: &Config,
    model: Option<&str>,
) -> Result<Arc<dyn TextCompletionProvider>> {
    let model = model
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(&config.completion.model);

    let provider: Arc<dyn TextCompletionProvider> = match config.completion.backend {
        CompletionBackend::Placeholder => Arc::new(PlaceholderCompletion::new(model)),
        CompletionBackend::Ollama => Arc::new(OllamaCompletion::new(config, model)?),
    };
    debug!("Using {:?} completion backend with model {}", config.completion.backend, model);
    Ok(provider)
}

/// Normalised answer to a coding question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub subtasks: Vec<String>,
    pub code: String,
    pub gotchas: Vec<String>,
    pub best_practices: Vec<String>,
    pub difficulty: String,
    pub docs_link: String,
    /// Backend payload, `{"response": ...}` or `{"error": ...}`
    pub raw: Value,
}

impl StructuredResponse {
    /// Response for a failed backend call
    #[inline]
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            raw: json!({ "error": message.into() }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplyFields {
    subtasks: Option<Vec<String>>,
    code: Option<String>,
    gotchas: Option<Vec<String>>,
    best_practices: Option<Vec<String>>,
    difficulty: Option<String>,
    docs_link: Option<String>,
}

impl ReplyFields {
    fn has_any(&self) -> bool {
        self.subtasks.is_some()
            || self.code.is_some()
            || self.gotchas.is_some()
            || self.best_practices.is_some()
            || self.difficulty.is_some()
            || self.docs_link.is_some()
    }
}

/// Turn a backend reply into a [`StructuredResponse`]
///
/// A reply holding a JSON object supplies whichever fields it has. Free text
/// gets the generic plan used by the placeholder backend.
#[inline]
pub fn parse_structured(reply: &str) -> StructuredResponse {
    let raw = json!({ "response": reply });

    let fields = extract_json_object(reply)
        .and_then(|value| serde_json::from_value::<ReplyFields>(value).ok())
        .filter(ReplyFields::has_any);

    match fields {
        Some(fields) => StructuredResponse {
            subtasks: fields.subtasks.unwrap_or_default(),
            code: fields.code.unwrap_or_default(),
            gotchas: fields.gotchas.unwrap_or_default(),
            best_practices: fields.best_practices.unwrap_or_default(),
            difficulty: fields.difficulty.unwrap_or_default(),
            docs_link: fields.docs_link.unwrap_or_default(),
            raw,
        },
        None => StructuredResponse {
            subtasks: vec![
                "Step 1: Analyze query".to_string(),
                "Step 2: Generate code".to_string(),
            ],
            code: "// Example code snippet".to_string(),
            gotchas: vec!["Check API compatibility".to_string()],
            best_practices: vec!["Use official docs".to_string()],
            difficulty: "Medium".to_string(),
            docs_link: "https://docs.unity3d.com/".to_string(),
            raw,
        },
    }
}

/// The outermost `{...}` span of `text`, if it parses as a JSON object
#[inline]
pub fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }

    text.get(start..=end)
        .and_then(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .filter(Value::is_object)
}
