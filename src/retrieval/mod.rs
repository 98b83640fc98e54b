// Retrieval service
// Chunks documents, builds and persists the vector index, answers top-k queries


use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::embeddings::{ChunkingConfig, Document, EmbeddingProvider, chunk_document};
use crate::index::VectorIndex;
use crate::{CodexrError, Result};

/// Shown in place of passages when no index has been built
pub const NO_INDEX_MESSAGE: &str = "⚠️ No index found. Run the ingest command first.";

/// Result of a retrieval request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    /// Matched chunk texts, nearest first
    Passages(Vec<String>),
    /// No index exists at the configured path
    IndexMissing,
}

impl Retrieval {
    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::IndexMissing)
    }

    /// Passages as shown to callers, with the sentinel for a missing index
    #[inline]
    pub fn into_docs(self) -> Vec<String> {
        match self {
            Self::Passages(passages) => passages,
            Self::IndexMissing => vec![NO_INDEX_MESSAGE.to_string()],
        }
    }
}

/// Summary of an index build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub path: PathBuf,
}

/// Snapshot of the loaded index for status surfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub provider: String,
    pub dimension: usize,
    pub entries: usize,
    pub created_at: DateTime<Utc>,
}

/// Owns the index handle shared by every request
///
/// Rebuilds hold the write lock for the whole build, so a query never sees a
/// half-replaced index.
pub struct RetrievalService {
    provider: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
    index_path: PathBuf,
    index: RwLock<Option<Arc<VectorIndex>>>,
}

impl RetrievalService {
    #[inline]
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
        index_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            chunking,
            index_path: index_path.into(),
            index: RwLock::new(None),
        }
    }

    #[inline]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Chunk, embed and persist `documents`, replacing any previous index
    #[inline]
    pub async fn build_index(&self, documents: &[Document]) -> Result<BuildReport> {
        self.chunking
            .validate()
            .map_err(|e| CodexrError::Config(e.to_string()))?;

        let mut chunks = Vec::new();
        for document in documents {
            let document_chunks = chunk_document(document, &self.chunking)
                .map_err(|e| CodexrError::Config(e.to_string()))?;
            chunks.extend(document_chunks);
        }

        if chunks.is_empty() {
            return Err(CodexrError::Input(
                "No text to index: every document was empty".to_string(),
            ));
        }

        let mut guard = self.index.write().await;

        let provider = Arc::clone(&self.provider);
        let built = tokio::task::spawn_blocking(move || VectorIndex::build(&chunks, provider))
            .await
            .map_err(|e| CodexrError::IndexBuild(format!("Index build task failed: {}", e)))??;

        built.persist(&self.index_path).await?;

        let report = BuildReport {
            documents: documents.len(),
            chunks: built.len(),
            path: self.index_path.clone(),
        };
        *guard = Some(Arc::new(built));

        info!(
            "Indexed {} chunks from {} documents into {}",
            report.chunks,
            report.documents,
            self.index_path.display()
        );
        Ok(report)
    }

    /// Up to `k` passages nearest to `query`, loading the index on first use
    #[inline]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Retrieval> {
        let Some(index) = self.current_index().await? else {
            return Ok(Retrieval::IndexMissing);
        };

        let query = query.to_string();
        let hits = tokio::task::spawn_blocking(move || index.query(&query, k))
            .await
            .map_err(|e| CodexrError::Backend(format!("Retrieval task failed: {}", e)))??;

        debug!("Retrieved {} passages", hits.len());
        Ok(Retrieval::Passages(
            hits.into_iter().map(|hit| hit.text).collect(),
        ))
    }

    /// The loaded index, loading it from disk if needed
    async fn current_index(&self) -> Result<Option<Arc<VectorIndex>>> {
        if let Some(index) = self.index.read().await.as_ref() {
            return Ok(Some(Arc::clone(index)));
        }

        let mut guard = self.index.write().await;
        // Another request may have loaded it while we waited
        if let Some(index) = guard.as_ref() {
            return Ok(Some(Arc::clone(index)));
        }

        match VectorIndex::load(&self.index_path, Arc::clone(&self.provider)).await {
            Ok(index) => {
                let index = Arc::new(index);
                *guard = Some(Arc::clone(&index));
                Ok(Some(index))
            }
            Err(CodexrError::IndexNotFound { path }) => {
                warn!("No index found at {}", path);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Whether an index is held in memory
    #[inline]
    pub async fn is_loaded(&self) -> bool {
        self.index.read().await.is_some()
    }

    /// Stats of the loaded index, loading it from disk if needed
    #[inline]
    pub async fn stats(&self) -> Result<Option<IndexStats>> {
        Ok(self.current_index().await?.map(|index| IndexStats {
            provider: index.provider_name().to_string(),
            dimension: index.dimension(),
            entries: index.len(),
            created_at: index.created_at(),
        }))
    }
}
