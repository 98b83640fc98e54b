// Debug handler
// Known-error lookup with a language model fallback


use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::llm::{CompletionMode, TextCompletionProvider, extract_json_object};

const DEFAULT_EXPLANATION: &str = "Likely cause of error";
const DEFAULT_FIX: &str = "Suggested fix";
const DEGRADED_FIX: &str =
    "Check the log against the engine documentation and retry once the language model is reachable.";

/// A substring that identifies a common engine error, and its canned fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownError {
    pub pattern: &'static str,
    pub fix: &'static str,
}

/// Checked in order; the first case-insensitive match wins
pub const KNOWN_ERRORS: &[KnownError] = &[
    KnownError {
        pattern: "NullReferenceException",
        fix: "This happens when a required component is not assigned. Fix: Assign the missing reference in the Inspector or via script.",
    },
    KnownError {
        pattern: "Blueprint runtime error",
        fix: "This occurs when a node has invalid inputs. Fix: Check your Blueprint node connections.",
    },
];

/// Where an analysis came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    KnownPattern,
    Backend,
    /// The backend call failed
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugAnalysis {
    pub error_message: String,
    pub explanation: String,
    pub fix_suggestion: String,
    pub source: AnalysisSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_response: Option<String>,
}

impl DebugAnalysis {
    /// Analysis returned when the backend could not be reached
    #[inline]
    pub fn degraded(error_log: &str, reason: impl fmt::Display) -> Self {
        Self {
            error_message: error_log.to_string(),
            explanation: format!("Language model unavailable: {}", reason),
            fix_suggestion: DEGRADED_FIX.to_string(),
            source: AnalysisSource::Degraded,
            backend_response: None,
        }
    }
}

/// First known error contained in `error_log`
#[inline]
pub fn lookup_known_error(error_log: &str) -> Option<&'static KnownError> {
    let haystack = error_log.to_lowercase();
    KNOWN_ERRORS
        .iter()
        .find(|known| haystack.contains(&known.pattern.to_lowercase()))
}

/// Prompt sent to the backend for logs with no known pattern
#[inline]
pub fn debug_prompt(error_log: &str) -> String {
    format!("Explain this error log and suggest a fix:\n{}", error_log)
}

#[derive(Clone)]
pub struct DebugHandler {
    backend: Arc<dyn TextCompletionProvider>,
}

impl DebugHandler {
    #[inline]
    pub fn new(backend: Arc<dyn TextCompletionProvider>) -> Self {
        Self { backend }
    }

    /// Explain an error log
    ///
    /// Known errors are answered without touching the backend. Anything else
    /// costs exactly one debug-mode completion. A failed completion still
    /// yields an analysis.
    #[inline]
    pub fn analyze_error(&self, error_log: &str) -> DebugAnalysis {
        let error_log = error_log.trim();

        if let Some(known) = lookup_known_error(error_log) {
            info!("Matched known error pattern '{}'", known.pattern);
            return DebugAnalysis {
                error_message: error_log.to_string(),
                explanation: format!("Detected known issue: {}", known.pattern),
                fix_suggestion: known.fix.to_string(),
                source: AnalysisSource::KnownPattern,
                backend_response: None,
            };
        }

        debug!("No known pattern matched, asking {}", self.backend.model());
        match self
            .backend
            .complete(&debug_prompt(error_log), CompletionMode::Debug)
        {
            Ok(reply) => parse_debug_reply(error_log, &reply),
            Err(e) => {
                warn!("Debug analysis backend failed: {:#}", e);
                DebugAnalysis::degraded(error_log, format!("{:#}", e))
            }
        }
    }
}

/// Read `explanation` and `fix_suggestion` out of a backend reply
///
/// Missing or blank fields fall back to generic text, so both are never empty.
#[inline]
pub fn parse_debug_reply(error_log: &str, reply: &str) -> DebugAnalysis {
    let parsed = extract_json_object(reply);
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|value| value.get(name))
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(ToString::to_string)
    };

    DebugAnalysis {
        error_message: error_log.to_string(),
        explanation: field("explanation").unwrap_or_else(|| DEFAULT_EXPLANATION.to_string()),
        fix_suggestion: field("fix_suggestion").unwrap_or_else(|| DEFAULT_FIX.to_string()),
        source: AnalysisSource::Backend,
        backend_response: Some(reply.to_string()),
    }
}
