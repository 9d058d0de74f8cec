//! Embedding-service boundary: text in, fixed-dimension vector out.

pub mod hashing;
pub mod http;

use async_trait::async_trait;
use thiserror::Error;

pub use hashing::HashingEmbedder;
pub use http::HttpEmbeddingService;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP transport failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Embedding has dimension {actual}, expected {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("Embedding service returned no vectors")]
    EmptyResponse,
}

#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    /// Embeds `text`. Called once per record description and once per query.
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimension(&self) -> usize;
}
