#[cfg(test)]
mod tests;

use std::time::Duration;
use tracing::debug;

use super::{CompletionMode, TextCompletionProvider};
use crate::config::Config;
use crate::embeddings::OllamaClient;

const GENERATE_TIMEOUT_SECONDS: u64 = 120;
// Generation is attempted once; callers degrade on failure
const GENERATE_ATTEMPTS: u32 = 1;

const NORMAL_SYSTEM_PROMPT: &str = "You are CodeXR, a coding assistant for AR/VR developers \
working in Unity and Unreal Engine. Reply with one JSON object with the keys subtasks \
(array of strings), code (string), gotchas (array of strings), best_practices (array of \
strings), difficulty (Easy, Medium or Hard) and docs_link (string).";

const DEBUG_SYSTEM_PROMPT: &str = "You are CodeXR, a debugging assistant for Unity and Unreal \
Engine projects. Reply with one JSON object with the keys explanation (the likely cause of \
the error) and fix_suggestion (how to fix it).";

/// Completions from Ollama's `/api/generate`
#[derive(Debug, Clone)]
pub struct OllamaCompletion {
    client: OllamaClient,
    model: String,
}

impl OllamaCompletion {
    #[inline]
    pub fn new(config: &Config, model: &str) -> anyhow::Result<Self> {
        let client = OllamaClient::new(config)?
            .with_timeout(Duration::from_secs(GENERATE_TIMEOUT_SECONDS))
            .with_retry_attempts(GENERATE_ATTEMPTS);
        Ok(Self::with_client(client, model))
    }

    #[inline]
    pub fn with_client(client: OllamaClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

impl TextCompletionProvider for OllamaCompletion {
    fn model(&self) -> &str {
        &self.model
    }

    fn complete(&self, prompt: &str, mode: CompletionMode) -> anyhow::Result<String> {
        let system = match mode {
            CompletionMode::Normal => NORMAL_SYSTEM_PROMPT,
            CompletionMode::Debug => DEBUG_SYSTEM_PROMPT,
        };
        debug!("Sending {} prompt to {}", mode, self.model);
        self.client.generate(&self.model, prompt, Some(system))
    }
}
