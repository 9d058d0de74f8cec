//! Vector-store boundary.
//!
//! `QdrantStore` talks to a Qdrant server over REST; `MemoryStore` keeps
//! everything in process with the same observable behaviour.

pub mod memory;
pub mod qdrant;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Point, ScoredPoint};
use crate::schema::{CollectionSchema, PayloadIndex};
use crate::vector::Metric;

pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP transport failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Collection '{0}' does not exist")]
    CollectionMissing(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected store response: {0}")]
    Decode(String),

    #[error("Poisoned Lock")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Parameters of one named vector as an existing collection reports them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorParams {
    pub dimension: usize,
    pub distance: Metric,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub points: u64,
    pub vectors: BTreeMap<String, VectorParams>,
    /// Indexed payload fields and their index kind.
    pub payload: BTreeMap<String, PayloadIndex>,
}

/// A bounded nearest-neighbor request.
#[derive(Debug, Clone)]
pub struct NearestQuery {
    pub vector_field: String,
    pub vector: Vec<f32>,
    pub limit: usize,
    pub score_threshold: Option<f32>,
    pub with_vectors: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub points: Vec<Point>,
    pub next_offset: Option<String>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn list_collections(&self) -> StoreResult<Vec<String>>;

    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> StoreResult<()>;

    /// `None` when the collection does not exist.
    async fn collection_info(&self, name: &str) -> StoreResult<Option<CollectionInfo>>;

    /// Succeeds when the collection is already gone.
    async fn delete_collection(&self, name: &str) -> StoreResult<()>;

    async fn upsert(&self, name: &str, points: Vec<Point>) -> StoreResult<()>;

    /// Zero for a missing collection.
    async fn count(&self, name: &str) -> StoreResult<u64>;

    /// Ordered by descending score.
    async fn query(&self, name: &str, query: &NearestQuery) -> StoreResult<Vec<ScoredPoint>>;

    /// One page of every point, payloads and vectors included.
    async fn scroll(&self, name: &str, offset: Option<String>, limit: usize) -> StoreResult<ScrollPage>;
}
