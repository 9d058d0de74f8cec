pub mod codec;
pub mod collection;
pub mod config;
pub mod domain;
pub mod embedding;
pub mod error;
pub mod factory;
pub mod model;
pub mod parser;
pub mod plugin;
pub mod records;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod vector;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::collection::{CancellationToken, Collection, ImportSummary, SearchOptions};
use crate::config::Settings;
use crate::domain::{ParsedEtwEvent, ParsedEtwManifest};
use crate::embedding::{EmbeddingGenerator, HashingEmbedder, HttpEmbeddingService};
use crate::error::{Error, Result};
use crate::factory::CollectionFactory;
use crate::model::Topic;
use crate::records::{EventRecord, ManifestRecord, VectorRecord};
use crate::store::{MemoryStore, QdrantStore, VectorStore};

/// Receives human-readable progress while collections are prepared.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

/// Forwards progress to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, message: &str) {
        info!("{}", message);
    }
}

/// Domain objects to import, tagged with the topic they belong to.
#[derive(Debug, Clone)]
pub enum TopicRecords {
    Manifests(Vec<ParsedEtwManifest>),
    EventData(Vec<ParsedEtwEvent>),
}

impl TopicRecords {
    pub fn topic(&self) -> Topic {
        match self {
            TopicRecords::Manifests(_) => Topic::Manifests,
            TopicRecords::EventData(_) => Topic::EventData,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TopicRecords::Manifests(items) => items.len(),
            TopicRecords::EventData(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A scored search result, reduced to its description text.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub description: String,
    pub score: f32,
}

struct Collections {
    manifests: Collection<ManifestRecord>,
    events: Collection<EventRecord>,
}

/// Owns the manifest and event-data collections and routes every call by topic.
pub struct VectorDatabase {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingGenerator>,
    factory: CollectionFactory,
    settings: Settings,
    collections: OnceCell<Collections>,
}

impl fmt::Debug for VectorDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorDatabase")
            .field("manifest_collection", &self.settings.manifest_collection)
            .field("event_collection", &self.settings.event_collection)
            .field("initialized", &self.collections.initialized())
            .finish()
    }
}

impl VectorDatabase {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingGenerator>, settings: Settings) -> Self {
        let factory = CollectionFactory::with_defaults(
            &settings.manifest_collection,
            &settings.event_collection,
            settings.integer_policy(),
        );
        Self { store, embedder, factory, settings, collections: OnceCell::new() }
    }

    /// Wires the store and embedder the settings ask for.
    pub fn from_settings(settings: Settings) -> Self {
        let (store, embedder): (Arc<dyn VectorStore>, Arc<dyn EmbeddingGenerator>) = if settings.in_memory {
            (Arc::new(MemoryStore::new()), Arc::new(HashingEmbedder::new(settings.embedding_dim)))
        } else {
            let embedder = HttpEmbeddingService::new(
                settings.embedding_url.clone(),
                settings.embedding_model.clone(),
                settings.embedding_dim,
            )
            .with_api_key(settings.embedding_api_key.clone());
            (
                Arc::new(QdrantStore::new(settings.qdrant_url.clone(), settings.qdrant_api_key.clone())),
                Arc::new(embedder),
            )
        };
        Self::new(store, embedder, settings)
    }

    /// Replaces the mapper table. Only effective before `initialize`.
    pub fn with_factory(mut self, factory: CollectionFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.collections.initialized()
    }

    /// Builds both collections and creates whichever the store lacks.
    /// Calling it again is a no-op.
    pub async fn initialize(&self, progress: &dyn ProgressSink) -> Result<()> {
        self.collections
            .get_or_try_init(|| async {
                let manifests = self.factory.create_collection::<ManifestRecord>(
                    &self.settings.manifest_collection,
                    self.store.clone(),
                    self.embedder.clone(),
                    self.settings.batch_size,
                )?;
                let events = self.factory.create_collection::<EventRecord>(
                    &self.settings.event_collection,
                    self.store.clone(),
                    self.embedder.clone(),
                    self.settings.batch_size,
                )?;

                let existing = self.store.list_collections().await?;
                for name in [manifests.name(), events.name()] {
                    if existing.iter().any(|n| n == name) {
                        progress.report(&format!("Collection '{}' found", name));
                    }
                }
                if !existing.iter().any(|n| n == manifests.name()) {
                    progress.report(&format!("Creating collection '{}'", manifests.name()));
                    manifests.create(false).await?;
                }
                if !existing.iter().any(|n| n == events.name()) {
                    progress.report(&format!("Creating collection '{}'", events.name()));
                    events.create(false).await?;
                }

                progress.report("Vector database ready");
                Ok::<_, Error>(Collections { manifests, events })
            })
            .await?;
        Ok(())
    }

    fn collections(&self) -> Result<&Collections> {
        self.collections.get().ok_or(Error::NotInitialized)
    }

    pub async fn get_record_count(&self, topic: Topic) -> Result<u64> {
        let c = self.collections()?;
        match topic {
            Topic::Manifests => c.manifests.record_count().await,
            Topic::EventData => c.events.record_count().await,
        }
    }

    /// Description of the single best match, or an empty string.
    pub async fn search(&self, topic: Topic, query: &str, options: &SearchOptions) -> Result<String> {
        let options = SearchOptions { top: 1, ..options.clone() };
        let hits = self.search_top_k(topic, query, &options).await?;
        Ok(hits.into_iter().next().map(|h| h.description).unwrap_or_default())
    }

    /// Up to `options.top` matches, best first.
    pub async fn search_top_k(&self, topic: Topic, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let c = self.collections()?;
        match topic {
            Topic::Manifests => Ok(to_hits(c.manifests.vector_search(query, options).await?)),
            Topic::EventData => Ok(to_hits(c.events.vector_search(query, options).await?)),
        }
    }

    pub async fn erase(&self, topic: Topic) -> Result<()> {
        let c = self.collections()?;
        match topic {
            Topic::Manifests => c.manifests.erase().await,
            Topic::EventData => c.events.erase().await,
        }
    }

    pub async fn import_data(&self, records: &TopicRecords, token: &CancellationToken) -> Result<ImportSummary> {
        let c = self.collections()?;
        match records {
            TopicRecords::Manifests(items) => c.manifests.import(items, token).await,
            TopicRecords::EventData(items) => c.events.import(items, token).await,
        }
    }

    pub async fn save_collection(&self, topic: Topic, path: &Path) -> Result<usize> {
        let c = self.collections()?;
        match topic {
            Topic::Manifests => c.manifests.save(path).await,
            Topic::EventData => c.events.save(path).await,
        }
    }

    pub async fn restore_collection(&self, topic: Topic, path: &Path) -> Result<usize> {
        let c = self.collections()?;
        match topic {
            Topic::Manifests => c.manifests.restore(path).await,
            Topic::EventData => c.events.restore(path).await,
        }
    }
}

fn to_hits<R: VectorRecord>(results: Vec<(R, f32)>) -> Vec<SearchHit> {
    results
        .into_iter()
        .map(|(record, score)| SearchHit { description: record.description().to_string(), score })
        .collect()
}
