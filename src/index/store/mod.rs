
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{CodexrError, Result};

pub const TABLE_NAME: &str = "chunks";
pub const MANIFEST_FILE: &str = "manifest.json";

/// One persisted row of the index
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// Insertion position, the tie-breaker for equal distances
    pub position: u32,
    pub source: String,
    pub content: String,
    pub vector: Vec<f32>,
}

/// Written after the table so a half-written index is never loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub provider: String,
    pub dimension: usize,
    pub entries: usize,
    pub created_at: DateTime<Utc>,
}

/// LanceDB-backed storage for a [`crate::index::VectorIndex`]
pub struct ChunkStore {
    connection: Connection,
    path: PathBuf,
}

impl ChunkStore {
    /// Open (and create if needed) the index directory
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            CodexrError::Database(format!(
                "Failed to create index directory {}: {}",
                path.display(),
                e
            ))
        })?;

        let uri = format!("file://{}", path.display());
        debug!("Connecting to LanceDB at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| CodexrError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            path: path.to_path_buf(),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub async fn has_table(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| CodexrError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.iter().any(|name| name == TABLE_NAME))
    }

    fn create_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("position", DataType::UInt32, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    dimension as i32,
                ),
                false,
            ),
        ]))
    }

    /// Drop any previous table and write `rows` in its place
    #[inline]
    pub async fn replace_rows(&self, dimension: usize, rows: &[StoredRow]) -> Result<()> {
        self.drop_table_if_exists().await?;

        let schema = Self::create_schema(dimension);
        let table = self
            .connection
            .create_empty_table(TABLE_NAME, schema)
            .execute()
            .await
            .map_err(|e| CodexrError::Database(format!("Failed to create table: {}", e)))?;

        if rows.is_empty() {
            debug!("No rows to store");
            return Ok(());
        }

        let record_batch = Self::create_record_batch(dimension, rows)?;
        let batch_schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), batch_schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| CodexrError::Database(format!("Failed to insert rows: {}", e)))?;

        info!("Stored {} rows in {}", rows.len(), self.path.display());
        Ok(())
    }

    fn create_record_batch(dimension: usize, rows: &[StoredRow]) -> Result<RecordBatch> {
        let mut positions = Vec::with_capacity(rows.len());
        let mut sources = Vec::with_capacity(rows.len());
        let mut contents = Vec::with_capacity(rows.len());
        let mut flat_values = Vec::with_capacity(rows.len() * dimension);

        for row in rows {
            if row.vector.len() != dimension {
                return Err(CodexrError::Database(format!(
                    "Row {} has dimension {}, expected {}",
                    row.position,
                    row.vector.len(),
                    dimension
                )));
            }
            positions.push(row.position);
            sources.push(row.source.as_str());
            contents.push(row.content.as_str());
            flat_values.extend_from_slice(&row.vector);
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            dimension as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| CodexrError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(UInt32Array::from(positions)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(contents)),
            Arc::new(vector_array),
        ];

        RecordBatch::try_new(Self::create_schema(dimension), arrays)
            .map_err(|e| CodexrError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Read every row back, ordered by position
    #[inline]
    pub async fn read_rows(&self) -> Result<Vec<StoredRow>> {
        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| CodexrError::Database(format!("Failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| CodexrError::Database(format!("Failed to count rows: {}", e)))?;
        if count == 0 {
            return Ok(Vec::new());
        }

        // Plain scans are limited by default
        let mut stream = table
            .query()
            .limit(count)
            .execute()
            .await
            .map_err(|e| CodexrError::Database(format!("Failed to scan table: {}", e)))?;

        let mut rows = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| CodexrError::Database(format!("Failed to read result stream: {}", e)))?
        {
            rows.extend(Self::parse_batch(&batch)?);
        }

        rows.sort_by_key(|row| row.position);
        debug!("Read {} rows from {}", rows.len(), self.path.display());
        Ok(rows)
    }

    fn parse_batch(batch: &RecordBatch) -> Result<Vec<StoredRow>> {
        let positions = batch
            .column_by_name("position")
            .ok_or_else(|| CodexrError::Database("Missing position column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| CodexrError::Database("Invalid position column type".to_string()))?;

        let sources = batch
            .column_by_name("source")
            .ok_or_else(|| CodexrError::Database("Missing source column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| CodexrError::Database("Invalid source column type".to_string()))?;

        let contents = batch
            .column_by_name("content")
            .ok_or_else(|| CodexrError::Database("Missing content column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| CodexrError::Database("Invalid content column type".to_string()))?;

        let vectors = batch
            .column_by_name("vector")
            .ok_or_else(|| CodexrError::Database("Missing vector column".to_string()))?
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .ok_or_else(|| CodexrError::Database("Invalid vector column type".to_string()))?;

        let mut rows = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let values = vectors.value(row);
            let floats = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| CodexrError::Database("Invalid vector item type".to_string()))?;

            rows.push(StoredRow {
                position: positions.value(row),
                source: sources.value(row).to_string(),
                content: contents.value(row).to_string(),
                vector: floats.values().to_vec(),
            });
        }

        Ok(rows)
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        if self.has_table().await? {
            info!("Dropping existing {} table", TABLE_NAME);
            self.connection
                .drop_table(TABLE_NAME)
                .await
                .map_err(|e| CodexrError::Database(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }
}

#[inline]
pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

/// Read the manifest, `None` when the directory holds no complete index
#[inline]
pub fn read_manifest(dir: &Path) -> Result<Option<IndexManifest>> {
    let path = manifest_path(dir);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path)?;
    match serde_json::from_str(&content) {
        Ok(manifest) => Ok(Some(manifest)),
        Err(e) => {
            warn!("Ignoring unreadable manifest {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

#[inline]
pub fn write_manifest(dir: &Path, manifest: &IndexManifest) -> Result<()> {
    let content = serde_json::to_string_pretty(manifest)
        .map_err(|e| CodexrError::Database(format!("Failed to serialize manifest: {}", e)))?;
    std::fs::write(manifest_path(dir), content)?;
    Ok(())
}

/// Remove the manifest so the directory counts as absent until rewritten
#[inline]
pub fn remove_manifest(dir: &Path) -> Result<()> {
    let path = manifest_path(dir);
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
