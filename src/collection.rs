//! A vector collection holding one record type.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::embedding::{EmbeddingError, EmbeddingGenerator};
use crate::error::{Error, Result};
use crate::model::{Point, DESCRIPTION_VECTOR};
use crate::records::{PointMapper, VectorRecord};
use crate::schema::CollectionSchema;
use crate::snapshot::{self, Snapshot};
use crate::store::{NearestQuery, VectorStore};

const SCROLL_PAGE: usize = 256;

/// Cooperative cancellation flag, checked between import batches.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Named vector to search; must be the schema's vector field.
    pub vector_field: String,
    pub top: usize,
    pub min_score: Option<f32>,
}

impl SearchOptions {
    pub fn top(k: usize) -> Self {
        Self { top: k, ..Self::default() }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { vector_field: DESCRIPTION_VECTOR.to_string(), top: 1, min_score: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub imported: usize,
    pub cancelled: bool,
}

pub struct Collection<R: VectorRecord> {
    name: String,
    schema: CollectionSchema,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingGenerator>,
    mapper: Arc<dyn PointMapper<R>>,
    batch_size: usize,
    schema_verified: AtomicBool,
}

impl<R: VectorRecord> std::fmt::Debug for Collection<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("kind", &R::KIND)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl<R: VectorRecord> Collection<R> {
    pub fn new(
        name: &str,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingGenerator>,
        mapper: Arc<dyn PointMapper<R>>,
        batch_size: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            schema: R::SCHEMA,
            store,
            embedder,
            mapper,
            batch_size: batch_size.max(1),
            schema_verified: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Returns true when the collection was (re)created, false when it was left alone.
    pub async fn create(&self, recreate_if_exists: bool) -> Result<bool> {
        let exists = self.store.list_collections().await?.iter().any(|n| n == &self.name);
        if exists && !recreate_if_exists {
            return Ok(false);
        }
        if exists {
            self.store.delete_collection(&self.name).await?;
        }
        self.store.create_collection(&self.name, &self.schema).await?;
        self.schema_verified.store(true, Ordering::SeqCst);
        info!(collection = %self.name, kind = %R::KIND, recreated = exists, "created collection");
        Ok(true)
    }

    pub async fn record_count(&self) -> Result<u64> {
        Ok(self.store.count(&self.name).await?)
    }

    /// Checks the live collection against the schema once. Returns false when
    /// the collection does not exist.
    async fn verify_schema(&self) -> Result<bool> {
        if self.schema_verified.load(Ordering::SeqCst) {
            return Ok(true);
        }
        let Some(info) = self.store.collection_info(&self.name).await? else {
            return Ok(false);
        };

        let field = &self.schema.vector;
        let params = info.vectors.get(field.name).ok_or_else(|| Error::SchemaMismatch {
            collection: self.name.clone(),
            detail: format!("no vector named '{}'", field.name),
        })?;
        self.schema
            .check_vector(params.dimension, params.distance)
            .and_then(|()| self.schema.check_payload(&info.payload))
            .map_err(|detail| Error::SchemaMismatch { collection: self.name.clone(), detail })?;

        self.schema_verified.store(true, Ordering::SeqCst);
        debug!(collection = %self.name, "schema verified");
        Ok(true)
    }

    /// Nearest records to `query_text`, best first. At most `options.top` results.
    pub async fn vector_search(&self, query_text: &str, options: &SearchOptions) -> Result<Vec<(R, f32)>> {
        if options.vector_field != self.schema.vector.name {
            return Err(Error::SchemaMismatch {
                collection: self.name.clone(),
                detail: format!("search requested vector '{}'", options.vector_field),
            });
        }
        if !self.verify_schema().await? || options.top == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.generate_embedding(query_text).await?;
        let query = NearestQuery {
            vector_field: options.vector_field.clone(),
            vector,
            limit: options.top,
            score_threshold: options.min_score,
            with_vectors: true,
        };

        let hits = self.store.query(&self.name, &query).await?;
        Ok(hits
            .into_iter()
            .map(|hit| (self.mapper.from_storage_point(&hit.point), hit.score))
            .collect())
    }

    /// Builds and upserts records batch by batch. Cancellation is checked
    /// before each batch; batches already written stay written.
    pub async fn import(&self, sources: &[R::Source], token: &CancellationToken) -> Result<ImportSummary> {
        self.create(false).await?;

        let mut summary = ImportSummary::default();
        for (batch_no, batch) in sources.chunks(self.batch_size).enumerate() {
            if token.is_cancelled() {
                warn!(
                    collection = %self.name,
                    imported = summary.imported,
                    remaining = sources.len() - summary.imported,
                    "import cancelled"
                );
                summary.cancelled = true;
                break;
            }

            let mut points = Vec::with_capacity(batch.len());
            for source in batch {
                let record = R::from_domain_object(source, self.embedder.as_ref()).await?;
                let actual = record.embedding().len();
                if actual != self.schema.vector.dimension {
                    return Err(EmbeddingError::Dimension { expected: self.schema.vector.dimension, actual }.into());
                }
                points.push(self.mapper.to_storage_point(&record));
            }

            self.store.upsert(&self.name, points).await?;
            summary.imported += batch.len();
            debug!(collection = %self.name, batch = batch_no, total = summary.imported, "imported batch");
        }

        info!(collection = %self.name, imported = summary.imported, "import finished");
        Ok(summary)
    }

    pub async fn erase(&self) -> Result<()> {
        self.store.delete_collection(&self.name).await?;
        self.schema_verified.store(false, Ordering::SeqCst);
        info!(collection = %self.name, "erased collection");
        Ok(())
    }

    async fn export_points(&self) -> Result<Vec<Point>> {
        let Some(info) = self.store.collection_info(&self.name).await? else {
            return Ok(Vec::new());
        };
        let mut points = Vec::with_capacity(info.points as usize);
        let mut offset = None;
        loop {
            let page = self.store.scroll(&self.name, offset, SCROLL_PAGE).await?;
            points.extend(page.points);
            match page.next_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(points)
    }

    /// Writes every point to `path`. Returns the number saved.
    pub async fn save(&self, path: &Path) -> Result<usize> {
        let points = self.export_points().await?;
        let count = points.len();
        let snapshot = Snapshot::from_points(&self.name, R::KIND, &self.schema.vector, points);
        snapshot::write_file(path, &snapshot).await?;
        info!(collection = %self.name, points = count, path = %path.display(), "saved collection");
        Ok(count)
    }

    /// Replaces the collection with the points stored at `path`.
    ///
    /// The archive is fully validated before anything is touched. After that
    /// the live collection is dropped and refilled batch by batch, so a
    /// transport failure part way through leaves only the batches already
    /// written; rerun the restore to recover.
    pub async fn restore(&self, path: &Path) -> Result<usize> {
        let snapshot = snapshot::read_file(path).await?;
        if snapshot.kind != R::KIND.to_string() {
            return Err(Error::SchemaMismatch {
                collection: self.name.clone(),
                detail: format!(
                    "snapshot of '{}' holds {} records, expected {} records",
                    snapshot.collection,
                    snapshot.kind,
                    R::KIND
                ),
            });
        }
        let field = &self.schema.vector;
        if snapshot.vector_field != field.name || snapshot.dimension as usize != field.dimension {
            return Err(Error::SchemaMismatch {
                collection: self.name.clone(),
                detail: format!(
                    "snapshot holds vector '{}' of dimension {}, expected '{}' of dimension {}",
                    snapshot.vector_field, snapshot.dimension, field.name, field.dimension
                ),
            });
        }

        let source = snapshot.collection.clone();
        let points = snapshot.into_points();
        if let Some(bad) = points
            .iter()
            .find(|p| p.vector(field.name).is_some_and(|v| v.len() != field.dimension))
        {
            return Err(Error::SchemaMismatch {
                collection: self.name.clone(),
                detail: format!("snapshot point '{}' has a vector of the wrong dimension", bad.key),
            });
        }

        let count = points.len();
        self.create(true).await?;
        let mut batch = Vec::with_capacity(self.batch_size);
        for point in points {
            batch.push(point);
            if batch.len() == self.batch_size {
                self.store.upsert(&self.name, std::mem::take(&mut batch)).await?;
            }
        }
        self.store.upsert(&self.name, batch).await?;

        info!(collection = %self.name, from = %source, points = count, path = %path.display(), "restored collection");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::IntegerParsePolicy;
    use crate::domain::ParsedEtwManifest;
    use crate::embedding::HashingEmbedder;
    use crate::factory::CollectionFactory;
    use crate::records::manifest::MANIFEST_SCHEMA;
    use crate::records::ManifestRecord;
    use crate::schema::{IndexKind, VectorField};
    use crate::store::MemoryStore;
    use crate::vector::Metric;

    const AREAS: [&str; 6] = ["Kernel", "Network", "Storage", "Graphics", "Audio", "Power"];

    fn manifests(n: usize) -> Vec<ParsedEtwManifest> {
        (0..n)
            .map(|i| ParsedEtwManifest {
                provider_name: Some(format!("Microsoft-Windows-{}-{}", AREAS[i % AREAS.len()], i)),
                keywords: vec![format!("{}Keyword", AREAS[i % AREAS.len()])],
                ..Default::default()
            })
            .collect()
    }

    fn collection(store: Arc<dyn VectorStore>, batch: usize) -> Collection<ManifestRecord> {
        CollectionFactory::with_defaults("m", "e", IntegerParsePolicy::Lossy)
            .create_collection("m", store, Arc::new(HashingEmbedder::default()), batch)
            .unwrap()
    }

    #[tokio::test]
    async fn create_is_idempotent_without_recreate() {
        let c = collection(Arc::new(MemoryStore::new()), 4);
        assert!(c.create(false).await.unwrap());
        c.import(&manifests(3), &CancellationToken::new()).await.unwrap();
        assert!(!c.create(false).await.unwrap());
        assert_eq!(c.record_count().await.unwrap(), 3);

        assert!(c.create(true).await.unwrap());
        assert_eq!(c.record_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pre_cancelled_import_writes_nothing() {
        let c = collection(Arc::new(MemoryStore::new()), 2);
        let token = CancellationToken::new();
        token.cancel();
        let summary = c.import(&manifests(5), &token).await.unwrap();
        assert_eq!(summary, ImportSummary { imported: 0, cancelled: true });
        assert_eq!(c.record_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_on_missing_collection_is_empty() {
        let c = collection(Arc::new(MemoryStore::new()), 2);
        assert!(c.vector_search("anything", &SearchOptions::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_with_foreign_vector_name_is_a_schema_error() {
        let c = collection(Arc::new(MemoryStore::new()), 2);
        let options = SearchOptions { vector_field: "title_embedding".into(), ..Default::default() };
        let err = c.vector_search("q", &options).await.unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn existing_collection_with_other_dimension_fails_at_search() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
        let mut narrow = MANIFEST_SCHEMA;
        narrow.vector = VectorField {
            name: DESCRIPTION_VECTOR,
            dimension: 8,
            index: IndexKind::Hnsw { m: 16, ef_construct: 100 },
            distance: Metric::Cosine,
        };
        store.create_collection("m", &narrow).await.unwrap();

        let c = collection(store, 2);
        let err = c.vector_search("q", &SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn search_returns_best_match_first() {
        let c = collection(Arc::new(MemoryStore::new()), 2);
        let sources = manifests(4);
        c.import(&sources, &CancellationToken::new()).await.unwrap();

        let target = ManifestRecord::describe(&sources[2]).description;
        let hits = c.vector_search(&target, &SearchOptions::top(3)).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0.description, target);
        assert!(hits[0].1 >= hits[1].1 && hits[1].1 >= hits[2].1);
    }

    #[tokio::test]
    async fn erase_then_import_recreates() {
        let c = collection(Arc::new(MemoryStore::new()), 2);
        c.erase().await.unwrap();
        c.import(&manifests(1), &CancellationToken::new()).await.unwrap();
        c.erase().await.unwrap();
        assert_eq!(c.record_count().await.unwrap(), 0);
        c.import(&manifests(2), &CancellationToken::new()).await.unwrap();
        assert_eq!(c.record_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn existing_collection_with_other_payload_fields_fails_at_search() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
        store.create_collection("m", &crate::records::event::EVENT_SCHEMA).await.unwrap();

        let c = collection(store, 2);
        let err = c.vector_search("kernel", &SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { ref detail, .. } if detail.contains("payload")));
    }

    #[tokio::test]
    async fn restore_rejects_a_snapshot_of_another_record_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.snap");
        let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
        let manifests_c = collection(store.clone(), 2);
        manifests_c.import(&manifests(2), &CancellationToken::new()).await.unwrap();
        manifests_c.save(&path).await.unwrap();

        let events: Collection<crate::records::EventRecord> =
            CollectionFactory::with_defaults("m", "e", IntegerParsePolicy::Lossy)
                .create_collection("e", store, Arc::new(HashingEmbedder::default()), 2)
                .unwrap();
        events.create(false).await.unwrap();
        let err = events.restore(&path).await.unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { ref detail, .. } if detail.contains("manifest records")));
        assert_eq!(events.record_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn restore_with_a_bad_vector_leaves_the_collection_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.snap");
        let c = collection(Arc::new(MemoryStore::new()), 2);
        c.import(&manifests(2), &CancellationToken::new()).await.unwrap();

        let mut point = Point::new("short");
        point.vectors.insert(DESCRIPTION_VECTOR.into(), vec![1.0, 0.0]);
        let snapshot = Snapshot::from_points("m", crate::model::RecordKind::Manifest, &MANIFEST_SCHEMA.vector, vec![point]);
        snapshot::write_file(&path, &snapshot).await.unwrap();

        assert!(matches!(c.restore(&path).await, Err(Error::SchemaMismatch { .. })));
        assert_eq!(c.record_count().await.unwrap(), 2);
    }
}
