//! Record types stored in the two collections, and their point mappers.

pub mod event;
pub mod manifest;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::embedding::EmbeddingGenerator;
use crate::error::Result;
use crate::factory::MapperEntry;
use crate::model::{Point, RecordKind};
use crate::schema::CollectionSchema;

pub use event::{EventMapper, EventRecord};
pub use manifest::{ManifestMapper, ManifestRecord};

pub const UNNAMED: &str = "(unnamed)";
pub const UNKNOWN: &str = "(unknown)";

/// A strongly-typed record that lives in a vector collection.
#[async_trait]
pub trait VectorRecord: Sized + Send + Sync + 'static {
    /// The parsed domain object this record is built from.
    type Source: Send + Sync;

    const KIND: RecordKind;
    const SCHEMA: CollectionSchema;

    /// Builds every field, then embeds the description exactly once.
    async fn from_domain_object(source: &Self::Source, embedder: &dyn EmbeddingGenerator) -> Result<Self>;

    /// Rebuilds a record from a stored point without any I/O.
    fn from_stored_point(point: &Point) -> Self;

    fn description(&self) -> &str;

    fn embedding(&self) -> &[f32];

    /// Picks this record's mapper out of a factory table entry.
    fn select_mapper(entry: &MapperEntry) -> Option<Arc<dyn PointMapper<Self>>>;
}

/// Pure translation between a record and a storage point.
pub trait PointMapper<R>: Send + Sync {
    fn to_storage_point(&self, record: &R) -> Point;

    fn from_storage_point(&self, point: &Point) -> R;
}

/// Parses the point key back to an id. Keys this crate wrote are always UUIDs.
pub(crate) fn parse_key(key: &str) -> Uuid {
    Uuid::parse_str(key).unwrap_or_else(|_| {
        tracing::warn!(key, "stored point key is not a UUID");
        Uuid::nil()
    })
}

/// Joins a list for a description sentence, or says `none`.
pub(crate) fn join_or_none(items: &[String]) -> String {
    if items.is_empty() { "none".to_string() } else { items.join(", ") }
}

pub(crate) fn or_default(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}
