use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbeddingError, EmbeddingGenerator};

/// Client for an OpenAI-compatible `/v1/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingService {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbeddingService {
    pub fn new(url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            model: model.into(),
            api_key: None,
            dimension,
        }
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    fn extract(&self, response: EmbeddingResponse) -> Result<Vec<f32>, EmbeddingError> {
        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(EmbeddingError::EmptyResponse)?;

        if vector.len() != self.dimension {
            return Err(EmbeddingError::Dimension { expected: self.dimension, actual: vector.len() });
        }
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingGenerator for HttpEmbeddingService {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&EmbeddingRequest { model: &self.model, input: text });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status { status, body });
        }

        let parsed = resp.json::<EmbeddingResponse>().await?;
        debug!(chars = text.len(), "generated embedding");
        self.extract(parsed)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
