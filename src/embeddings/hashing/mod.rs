//! Offline embedding provider based on the hashing trick
//!
//! Every lowercase word, plus every character 4-gram of longer words, is hashed
//! into one of `dimension` signed buckets and the result is L2-normalised. No
//! model download or network access is involved, so indexes built with it are
//! reproducible across processes.


use super::EmbeddingProvider;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const WORD_WEIGHT: f32 = 1.0;
const GRAM_WEIGHT: f32 = 0.25;
const GRAM_LEN: usize = 4;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed a single text without going through the trait's `Result`
    #[inline]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];

        for token in tokenize(text) {
            self.add_feature(&mut vector, token.as_bytes(), WORD_WEIGHT);

            let chars: Vec<char> = token.chars().collect();
            if chars.len() > GRAM_LEN {
                for gram in chars.windows(GRAM_LEN) {
                    let gram: String = gram.iter().collect();
                    self.add_feature(&mut vector, gram.as_bytes(), GRAM_WEIGHT);
                }
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> String {
        format!("hashing-{}", self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn batch_size(&self) -> usize {
        256
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}
