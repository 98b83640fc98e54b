#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;

/// Separators a window prefers to end on, strongest first
const SEPARATORS: [&[char]; 3] = [&['\n', '\n'], &['\n'], &[' ']];

/// Raw text fetched from a single source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// URL or caller-supplied identifier
    pub source: String,
    pub text: String,
}

impl Document {
    #[inline]
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// A contiguous window of a document, the unit of embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub source: String,
    /// Position of this chunk within its document
    pub chunk_index: usize,
    /// Offset of the first character within the document, in chars
    pub start: usize,
    pub text: String,
}

/// Configuration for content chunking, measured in characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }
        Ok(())
    }
}

/// Split text into overlapping windows of at most `chunk_size` characters
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>, ConfigError> {
    config.validate()?;
    let chars: Vec<char> = text.chars().collect();

    Ok(chunk_spans(&chars, config)
        .into_iter()
        .map(|(start, end)| chars[start..end].iter().collect())
        .collect())
}

/// Chunk a document, keeping its source and the char offset of every chunk
#[inline]
pub fn chunk_document(
    document: &Document,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, ConfigError> {
    config.validate()?;
    let chars: Vec<char> = document.text.chars().collect();

    let chunks: Vec<Chunk> = chunk_spans(&chars, config)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, (start, end))| Chunk {
            source: document.source.clone(),
            chunk_index,
            start,
            text: chars[start..end].iter().collect(),
        })
        .collect();

    debug!(
        "Chunked '{}' ({} chars) into {} chunks",
        document.source,
        chars.len(),
        chunks.len()
    );

    Ok(chunks)
}

/// Compute `[start, end)` char spans. Each span after the first starts exactly
/// `chunk_overlap` chars before the previous end.
fn chunk_spans(chars: &[char], config: &ChunkingConfig) -> Vec<(usize, usize)> {
    let len = chars.len();
    let mut spans = Vec::new();
    if len == 0 {
        return spans;
    }

    let mut start = 0;
    loop {
        let hard_end = (start + config.chunk_size).min(len);
        let end = if hard_end == len {
            len
        } else {
            find_break(chars, start, hard_end, config)
        };

        spans.push((start, end));
        if end == len {
            break;
        }
        start = end - config.chunk_overlap;
    }

    spans
}

/// Latest separator boundary in the back half of the window, or `hard_end`
fn find_break(chars: &[char], start: usize, hard_end: usize, config: &ChunkingConfig) -> usize {
    // end > start + overlap keeps the next window moving forward
    let min_end = (start + config.chunk_overlap + 1).max(start + config.chunk_size / 2);

    for separator in SEPARATORS {
        let found = (min_end..=hard_end)
            .rev()
            .find(|&end| end >= separator.len() && chars[end - separator.len()..end] == *separator);
        if let Some(end) = found {
            return end;
        }
    }

    hard_end
}
