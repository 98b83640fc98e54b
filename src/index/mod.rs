// Vector index module
// Flat in-memory L2 index over embedded chunks, persisted through LanceDB


pub mod store;

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::embeddings::{Chunk, EmbeddingProvider};
use crate::{CodexrError, Result};
use store::{ChunkStore, IndexManifest, StoredRow};

/// A stored chunk and its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub source: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// One query result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Insertion position within the index
    pub position: usize,
    pub source: String,
    pub text: String,
    /// Squared L2 distance to the query vector
    pub distance: f32,
}

/// Read-only nearest-neighbour index, built once or loaded from disk
pub struct VectorIndex {
    provider: Arc<dyn EmbeddingProvider>,
    provider_name: String,
    dimension: usize,
    rows: Vec<IndexedChunk>,
    created_at: DateTime<Utc>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("provider", &self.provider_name)
            .field("dimension", &self.dimension)
            .field("rows", &self.rows.len())
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl VectorIndex {
    /// Embed every chunk in provider-sized batches
    ///
    /// Any embedding failure, count mismatch or wrong-dimension vector fails
    /// the whole build.
    #[inline]
    pub fn build(chunks: &[Chunk], provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let dimension = provider.dimension();
        let batch_size = provider.batch_size().max(1);
        let mut rows = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = provider.embed_batch(&texts).map_err(|e| {
                CodexrError::IndexBuild(format!(
                    "Embedding failed for batch starting at chunk {}: {:#}",
                    rows.len(),
                    e
                ))
            })?;

            if vectors.len() != batch.len() {
                return Err(CodexrError::IndexBuild(format!(
                    "Provider returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }

            for (chunk, vector) in batch.iter().zip(vectors) {
                if vector.len() != dimension {
                    return Err(CodexrError::IndexBuild(format!(
                        "Provider returned a {}-dimensional vector, expected {}",
                        vector.len(),
                        dimension
                    )));
                }
                rows.push(IndexedChunk {
                    source: chunk.source.clone(),
                    text: chunk.text.clone(),
                    vector,
                });
            }

            debug!("Embedded {}/{} chunks", rows.len(), chunks.len());
        }

        info!(
            "Built index of {} chunks with provider {}",
            rows.len(),
            provider.name()
        );

        Ok(Self {
            provider_name: provider.name(),
            provider,
            dimension,
            rows,
            created_at: Utc::now(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    pub fn rows(&self) -> &[IndexedChunk] {
        &self.rows
    }

    /// Embed `text` and return the `min(k, len)` nearest chunks
    #[inline]
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.rows.is_empty() {
            return Ok(Vec::new());
        }

        let vector = self
            .provider
            .embed(text)
            .map_err(|e| CodexrError::Backend(format!("Failed to embed query: {:#}", e)))?;

        self.search(&vector, k)
    }

    /// Nearest chunks to a precomputed vector, ties broken by position
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(CodexrError::Backend(format!(
                "Query vector has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(position, row)| (position, squared_l2(query, &row.vector)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| {
                let row = &self.rows[position];
                SearchHit {
                    position,
                    source: row.source.clone(),
                    text: row.text.clone(),
                    distance,
                }
            })
            .collect())
    }

    /// Write the index to `dir`, manifest last
    #[inline]
    pub async fn persist(&self, dir: &Path) -> Result<()> {
        let stored = self
            .rows
            .iter()
            .enumerate()
            .map(|(position, row)| {
                Ok(StoredRow {
                    position: stored_position(position)?,
                    source: row.source.clone(),
                    content: row.text.clone(),
                    vector: row.vector.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let store = ChunkStore::open(dir).await?;
        store::remove_manifest(dir)?;
        store.replace_rows(self.dimension, &stored).await?;

        store::write_manifest(
            dir,
            &IndexManifest {
                provider: self.provider_name.clone(),
                dimension: self.dimension,
                entries: self.rows.len(),
                created_at: self.created_at,
            },
        )?;

        info!("Persisted {} chunks to {}", self.rows.len(), dir.display());
        Ok(())
    }

    /// Restore an index written by [`VectorIndex::persist`]
    #[inline]
    pub async fn load(dir: &Path, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let not_found = || CodexrError::IndexNotFound {
            path: dir.display().to_string(),
        };

        let manifest = store::read_manifest(dir)?.ok_or_else(not_found)?;

        if manifest.provider != provider.name() || manifest.dimension != provider.dimension() {
            return Err(CodexrError::IndexBuild(format!(
                "Index at {} was built with {} ({} dimensions), current provider is {} ({} dimensions)",
                dir.display(),
                manifest.provider,
                manifest.dimension,
                provider.name(),
                provider.dimension()
            )));
        }

        let store = ChunkStore::open(dir).await?;
        if !store.has_table().await? {
            return Err(not_found());
        }

        let stored = store.read_rows().await?;
        if stored.len() != manifest.entries {
            return Err(CodexrError::Database(format!(
                "Index at {} holds {} rows, manifest records {}",
                dir.display(),
                stored.len(),
                manifest.entries
            )));
        }

        let rows = stored
            .into_iter()
            .map(|row| IndexedChunk {
                source: row.source,
                text: row.content,
                vector: row.vector,
            })
            .collect::<Vec<_>>();

        info!("Loaded {} chunks from {}", rows.len(), dir.display());

        Ok(Self {
            provider_name: manifest.provider,
            provider,
            dimension: manifest.dimension,
            rows,
            created_at: manifest.created_at,
        })
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Row position as stored in the `position` column
fn stored_position(position: usize) -> Result<u32> {
    u32::try_from(position).map_err(|_| {
        CodexrError::IndexBuild(format!(
            "Chunk position {} exceeds the storable range",
            position
        ))
    })
}
