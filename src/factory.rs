//! Lookup table from (collection name, record kind) to the point mapper the
//! collection must use. Built once at start-up.

use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::IntegerParsePolicy;
use crate::collection::Collection;
use crate::embedding::EmbeddingGenerator;
use crate::error::{Error, Result};
use crate::model::RecordKind;
use crate::records::{EventMapper, EventRecord, ManifestMapper, ManifestRecord, PointMapper, VectorRecord};
use crate::store::VectorStore;

#[derive(Clone)]
pub enum MapperEntry {
    Manifest(Arc<dyn PointMapper<ManifestRecord>>),
    Event(Arc<dyn PointMapper<EventRecord>>),
}

impl MapperEntry {
    pub fn kind(&self) -> RecordKind {
        match self {
            MapperEntry::Manifest(_) => RecordKind::Manifest,
            MapperEntry::Event(_) => RecordKind::Event,
        }
    }
}

#[derive(Clone, Default)]
pub struct CollectionFactory {
    table: HashMap<(String, RecordKind), MapperEntry>,
}

impl CollectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the stock mappers for the two collections.
    pub fn with_defaults(manifest_collection: &str, event_collection: &str, policy: IntegerParsePolicy) -> Self {
        let mut factory = Self::new();
        factory.register(
            manifest_collection,
            MapperEntry::Manifest(Arc::new(ManifestMapper { integer_policy: policy })),
        );
        factory.register(event_collection, MapperEntry::Event(Arc::new(EventMapper)));
        factory
    }

    pub fn register(&mut self, collection: &str, entry: MapperEntry) {
        self.table.insert((collection.to_string(), entry.kind()), entry);
    }

    /// Fails with `MapperNotRegistered` when the pairing is unknown.
    pub fn mapper_for<R: VectorRecord>(&self, collection: &str) -> Result<Arc<dyn PointMapper<R>>> {
        self.table
            .get(&(collection.to_string(), R::KIND))
            .and_then(R::select_mapper)
            .ok_or_else(|| Error::MapperNotRegistered { collection: collection.to_string(), kind: R::KIND })
    }

    pub fn create_collection<R: VectorRecord>(
        &self,
        name: &str,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingGenerator>,
        batch_size: usize,
    ) -> Result<Collection<R>> {
        let mapper = self.mapper_for::<R>(name)?;
        let produced = embedder.dimension();
        let collection = Collection::new(name, store, embedder, mapper, batch_size);

        let vector = collection.schema().vector;
        if produced != vector.dimension {
            return Err(Error::SchemaMismatch {
                collection: name.to_string(),
                detail: format!(
                    "embedder produces {} dimensions, vector '{}' holds {}",
                    produced, vector.name, vector.dimension
                ),
            });
        }
        Ok(collection)
    }
}
