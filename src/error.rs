//! Error types for etwsense.
//!
//! Configuration errors (missing mapper, schema mismatch) are kept apart
//! from transport errors so callers can fail fast on the former.

use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::model::RecordKind;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An operation ran before `VectorDatabase::initialize`.
    #[error("Vector database used before initialization")]
    NotInitialized,

    #[error("No point mapper registered for collection '{collection}' and record kind {kind}")]
    MapperNotRegistered { collection: String, kind: RecordKind },

    #[error("Schema mismatch on collection '{collection}': {detail}")]
    SchemaMismatch { collection: String, detail: String },

    #[error("Unknown topic: '{0}'")]
    UnknownTopic(String),

    #[error("Unknown plugin function: '{0}'")]
    UnknownFunction(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Embedding service error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    /// True for errors caused by wiring or schema problems rather than I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MapperNotRegistered { .. } | Error::SchemaMismatch { .. } | Error::NotInitialized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapper_not_registered_names_collection_and_kind() {
        let err = Error::MapperNotRegistered {
            collection: "etw_manifests".to_string(),
            kind: RecordKind::Event,
        };
        let msg = err.to_string();
        assert!(msg.contains("etw_manifests"));
        assert!(msg.contains("event"));
        assert!(err.is_configuration());
    }

    #[test]
    fn transport_errors_are_not_configuration() {
        let err = Error::Store(StoreError::CollectionMissing("x".to_string()));
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("Vector store error"));
    }
}
