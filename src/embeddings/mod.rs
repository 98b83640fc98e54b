// Embeddings module
// Text chunking and the providers that turn chunks into vectors

pub mod chunking;
pub mod hashing;
pub mod ollama;

use std::sync::Arc;

use crate::config::{Config, EmbeddingProviderKind};

pub use chunking::{Chunk, ChunkingConfig, Document, chunk_document, chunk_text};
pub use hashing::HashingEmbedder;
pub use ollama::OllamaClient;

/// A source of fixed-dimension text embeddings
///
/// Implementations must return one vector per input, in input order, and every
/// vector must have [`EmbeddingProvider::dimension`] components.
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier recorded in persisted indexes
    fn name(&self) -> String;

    fn dimension(&self) -> usize;

    /// Maximum number of texts sent per request
    fn batch_size(&self) -> usize {
        16
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Provider returned no embedding"))
    }
}

/// Build the provider selected in the configuration
#[inline]
pub fn provider_from_config(config: &Config) -> crate::Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.embedding.provider {
        EmbeddingProviderKind::Ollama => Arc::new(OllamaClient::new(config)?),
        EmbeddingProviderKind::Hashing => {
            Arc::new(HashingEmbedder::new(config.embedding.dimension as usize))
        }
    };
    Ok(provider)
}
