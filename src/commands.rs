use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::crawler::DocsLoader;
use crate::embeddings::provider_from_config;
use crate::orchestrator::{AssistantRequest, Orchestrator};
use crate::retrieval::{BuildReport, RetrievalService};
use crate::server::{AppState, resolve_addr};
use crate::speech::speech_from_config;

/// Retrieval service over the configured index directory
#[inline]
pub fn retrieval_service(config: &Config) -> Result<Arc<RetrievalService>> {
    let provider = provider_from_config(config).context("Failed to create embedding provider")?;
    Ok(Arc::new(RetrievalService::new(
        provider,
        config.chunking.clone(),
        config.index_path(),
    )))
}

/// Fetch documentation pages and rebuild the index from them
///
/// The configured default pages are used when `urls` is empty.
#[inline]
pub async fn ingest(config: &Config, urls: Vec<String>) -> Result<BuildReport> {
    let urls = if urls.is_empty() {
        config.loader.urls.clone()
    } else {
        urls
    };
    info!("Ingesting {} documentation pages", urls.len());

    let mut loader = DocsLoader::new(&config.loader);
    let loaded = loader.load_all(&urls).await?;
    for (url, reason) in &loaded.failures {
        eprintln!("⚠️  Skipped {}: {}", url, reason);
    }

    let report = retrieval_service(config)?
        .build_index(&loaded.documents)
        .await?;

    println!("✅ Index built");
    println!("   Pages loaded: {}/{}", loaded.documents.len(), urls.len());
    println!("   Chunks indexed: {}", report.chunks);
    println!("   Location: {}", report.path.display());
    Ok(report)
}

/// Inputs for a one-shot `ask`
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub query: Option<String>,
    pub error_log: Option<String>,
    /// WAV recording transcribed in place of `query`
    pub audio: Option<PathBuf>,
    pub model: Option<String>,
}

/// Answer one request and return the response object with its snippet
#[inline]
pub async fn ask(config: &Config, options: AskOptions) -> Result<Value> {
    let mut query = options.query;
    if let Some(audio) = &options.audio {
        match transcribe_file(config, audio).await {
            Ok(text) => {
                eprintln!("🎤 Transcribed query: {}", text);
                query = Some(text);
            }
            Err(e) => {
                warn!("Transcription failed: {:#}", e);
                eprintln!("❌ Whisper error: {:#}", e);
            }
        }
    }

    let orchestrator =
        Orchestrator::from_config(config, retrieval_service(config)?, options.model.as_deref())?;
    let response = orchestrator
        .handle(AssistantRequest {
            user_query: query,
            error_logs: options.error_log,
        })
        .await?;
    Ok(response.with_snippet())
}

async fn transcribe_file(config: &Config, path: &Path) -> Result<String> {
    let speech = speech_from_config(&config.speech)?.ok_or_else(|| {
        anyhow!("Transcription is not configured (set speech.api_key or OPENAI_API_KEY)")
    })?;
    let audio = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read audio file: {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let transcription = speech.transcribe(&audio, &filename).await?;
    Ok(transcription.text)
}

/// Run the HTTP server; `bind` and `port` override the configuration
#[inline]
pub async fn serve(config: &Config, bind: Option<String>, port: Option<u16>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let port = port.unwrap_or(config.server.port);

    let orchestrator = Orchestrator::from_config(config, retrieval_service(config)?, None)?;
    let state = AppState::new(Arc::new(orchestrator), speech_from_config(&config.speech)?);

    crate::server::serve(resolve_addr(&bind, port), state, config.server.max_body_size).await?;
    Ok(())
}

/// Print the state of the index and the configured backends
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 CodeXR Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔍 Index Status:");
    match retrieval_service(config) {
        Ok(service) => match service.stats().await {
            Ok(Some(stats)) => {
                println!("   ✅ Index: {}", service.index_path().display());
                println!("   🧩 Chunks: {}", stats.entries);
                println!("   🤖 Embeddings: {} ({} dims)", stats.provider, stats.dimension);
                println!(
                    "   🕒 Built: {}",
                    stats.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            Ok(None) => {
                println!("   ⚠️  No index found. Run the ingest command first.");
            }
            Err(e) => {
                println!("   ❌ Index unreadable - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Embedding provider unavailable - {:#}", e);
        }
    }

    println!();
    println!("🤖 Embedding Provider:");
    match config.embedding.provider {
        crate::config::EmbeddingProviderKind::Hashing => {
            println!("   ✅ Hashing ({} dims, offline)", config.embedding.dimension);
        }
        crate::config::EmbeddingProviderKind::Ollama => {
            match crate::embeddings::OllamaClient::new(config) {
                Ok(client) => match client.health_check() {
                    Ok(()) => println!(
                        "   ✅ Ollama: Connected ({}:{}) with {}",
                        config.embedding.host, config.embedding.port, config.embedding.model
                    ),
                    Err(e) => println!("   ⚠️  Ollama: Connected but unhealthy - {:#}", e),
                },
                Err(e) => println!("   ❌ Ollama: Failed to connect - {:#}", e),
            }
        }
    }

    println!();
    println!("💬 Language Model: {:?} ({})", config.completion.backend, config.completion.model);
    println!(
        "🌐 Web Search: {}",
        enabled(config.search.resolved_api_key().is_some())
    );
    println!(
        "🎤 Transcription: {}",
        enabled(config.speech.resolved_api_key().is_some())
    );
    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag { "enabled" } else { "disabled" }
}
