use async_trait::async_trait;
use seahash::hash;

use super::{EmbeddingError, EmbeddingGenerator};
use crate::model::VECTOR_DIM;

/// Deterministic offline embedder.
///
/// Lower-cased alphanumeric tokens are hashed into signed buckets and the
/// result is L2-normalised, so texts sharing vocabulary land close together
/// under cosine similarity. Identical text always yields an identical vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = hash(token.to_lowercase().as_bytes());
            let bucket = (h % self.dimension as u64) as usize;
            // Top bit picks the sign so collisions partly cancel
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(VECTOR_DIM)
    }
}

#[async_trait]
impl EmbeddingGenerator for HashingEmbedder {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
