use clap::Args;

use crate::codec::IntegerParsePolicy;
use crate::model::VECTOR_DIM;

pub const MANIFEST_COLLECTION: &str = "etw_manifests";
pub const EVENT_COLLECTION: &str = "etw_event_data";

/// Start-up settings shared by both binaries. Every flag has an env fallback.
#[derive(Args, Clone, Debug)]
pub struct Settings {
    /// Qdrant REST endpoint
    #[clap(long, env = "ETWSENSE_QDRANT_URL", default_value = "http://localhost:6333")]
    pub qdrant_url: String,

    #[clap(long, env = "ETWSENSE_QDRANT_API_KEY")]
    pub qdrant_api_key: Option<String>,

    /// OpenAI-compatible embeddings endpoint
    #[clap(long, env = "ETWSENSE_EMBEDDING_URL", default_value = "http://localhost:11434/v1/embeddings")]
    pub embedding_url: String,

    #[clap(long, env = "ETWSENSE_EMBEDDING_MODEL", default_value = "all-minilm")]
    pub embedding_model: String,

    #[clap(long, env = "ETWSENSE_EMBEDDING_API_KEY")]
    pub embedding_api_key: Option<String>,

    #[clap(long, env = "ETWSENSE_EMBEDDING_DIM", default_value_t = VECTOR_DIM)]
    pub embedding_dim: usize,

    /// Records per upsert during import
    #[clap(long, env = "ETWSENSE_BATCH_SIZE", default_value_t = 64)]
    pub batch_size: usize,

    #[clap(long, env = "ETWSENSE_MANIFEST_COLLECTION", default_value = MANIFEST_COLLECTION)]
    pub manifest_collection: String,

    #[clap(long, env = "ETWSENSE_EVENT_COLLECTION", default_value = EVENT_COLLECTION)]
    pub event_collection: String,

    /// Log every non-numeric entry dropped from integer payload lists
    #[clap(long, env = "ETWSENSE_WARN_ON_DROPPED")]
    pub warn_on_dropped: bool,

    /// Keep everything in process and embed with the offline hashing embedder
    #[clap(long, env = "ETWSENSE_IN_MEMORY")]
    pub in_memory: bool,
}

impl Settings {
    pub fn integer_policy(&self) -> IntegerParsePolicy {
        if self.warn_on_dropped { IntegerParsePolicy::Warn } else { IntegerParsePolicy::Lossy }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_api_key: None,
            embedding_url: "http://localhost:11434/v1/embeddings".to_string(),
            embedding_model: "all-minilm".to_string(),
            embedding_api_key: None,
            embedding_dim: VECTOR_DIM,
            batch_size: 64,
            manifest_collection: MANIFEST_COLLECTION.to_string(),
            event_collection: EVENT_COLLECTION.to_string(),
            warn_on_dropped: false,
            in_memory: false,
        }
    }
}
