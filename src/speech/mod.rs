// Speech-to-text module
// WAV validation and the Whisper transcription client


use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SpeechConfig;
use crate::{CodexrError, Result};

const REQUEST_TIMEOUT_SECONDS: u64 = 120;
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
}

/// A black-box transcription capability
pub trait SpeechToText: Send + Sync {
    fn transcribe<'a>(
        &'a self,
        audio: &'a [u8],
        filename: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Transcription>> + Send + 'a>>;
}

/// Reject anything that is not a RIFF/WAVE file named `*.wav`
///
/// Names with control characters or path separators are refused too, since
/// the name is forwarded upstream.
#[inline]
pub fn validate_wav(filename: &str, audio: &[u8]) -> Result<()> {
    if !filename.to_lowercase().ends_with(".wav") {
        return Err(CodexrError::Transcription(
            "Only .wav files are supported".to_string(),
        ));
    }
    if filename
        .chars()
        .any(|c| c.is_control() || matches!(c, '/' | '\\' | '"'))
    {
        return Err(CodexrError::Transcription(
            "File name contains invalid characters".to_string(),
        ));
    }
    if audio.len() < 12 || &audio[0..4] != b"RIFF" || &audio[8..12] != b"WAVE" {
        return Err(CodexrError::Transcription(format!(
            "{} is not a RIFF/WAVE file",
            filename
        )));
    }
    Ok(())
}

/// Whisper client when an API key is configured
#[inline]
pub fn speech_from_config(config: &SpeechConfig) -> Result<Option<Arc<dyn SpeechToText>>> {
    let Some(api_key) = config.resolved_api_key() else {
        return Ok(None);
    };
    info!("Speech transcription enabled via {}", config.base_url);
    let client = WhisperClient::new(api_key, &config.base_url, &config.model)?;
    Ok(Some(Arc::new(client)))
}

/// OpenAI-compatible `/audio/transcriptions` client
pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for WhisperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

impl WhisperClient {
    #[inline]
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| CodexrError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    async fn send(&self, audio: &[u8], filename: &str) -> Result<Transcription> {
        validate_wav(filename, audio)?;

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(filename.to_string())
            .mime_str("audio/wav")
            .map_err(|e| CodexrError::Transcription(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", part);

        let url = format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'));
        debug!("Transcribing {} ({} bytes) via {}", filename, audio.len(), url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CodexrError::Transcription(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(CodexrError::Transcription(format!("{}: {}", status, body)));
        }

        let parsed: WhisperResponse = response
            .json()
            .await
            .map_err(|e| CodexrError::Transcription(format!("invalid response: {}", e)))?;
        info!("Transcribed {} into {} chars", filename, parsed.text.len());
        Ok(Transcription {
            text: parsed.text.trim().to_string(),
        })
    }
}

impl SpeechToText for WhisperClient {
    fn transcribe<'a>(
        &'a self,
        audio: &'a [u8],
        filename: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Transcription>> + Send + 'a>> {
        Box::pin(self.send(audio, filename))
    }
}
