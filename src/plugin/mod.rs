//! Named search functions for automation callers.

pub mod api;

use std::sync::Arc;

use serde::Serialize;

use crate::collection::SearchOptions;
use crate::error::{Error, Result};
use crate::model::{Topic, DESCRIPTION_VECTOR};
use crate::VectorDatabase;

pub const SEARCH_MANIFESTS: &str = "search_manifests";
pub const SEARCH_EVENTS: &str = "search_events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub description: &'static str,
}

pub const FUNCTIONS: [FunctionDescriptor; 2] = [
    FunctionDescriptor {
        name: SEARCH_MANIFESTS,
        description: "Finds the ETW provider manifest that best matches a free-text question \
                      and returns its description.",
    },
    FunctionDescriptor {
        name: SEARCH_EVENTS,
        description: "Finds the recorded ETW event that best matches a free-text question \
                      and returns its description.",
    },
];

#[derive(Debug, Clone)]
pub struct SearchPlugin {
    db: Arc<VectorDatabase>,
}

impl SearchPlugin {
    pub fn new(db: Arc<VectorDatabase>) -> Self {
        Self { db }
    }

    pub fn functions(&self) -> &'static [FunctionDescriptor] {
        &FUNCTIONS
    }

    pub async fn search_manifests(&self, query: &str) -> Result<String> {
        self.search(Topic::Manifests, query).await
    }

    pub async fn search_events(&self, query: &str) -> Result<String> {
        self.search(Topic::EventData, query).await
    }

    /// Calls a function by its descriptor name.
    pub async fn invoke(&self, function: &str, query: &str) -> Result<String> {
        match function {
            SEARCH_MANIFESTS => self.search_manifests(query).await,
            SEARCH_EVENTS => self.search_events(query).await,
            other => Err(Error::UnknownFunction(other.to_string())),
        }
    }

    async fn search(&self, topic: Topic, query: &str) -> Result<String> {
        let options = SearchOptions { vector_field: DESCRIPTION_VECTOR.to_string(), ..SearchOptions::default() };
        self.db.search(topic, query, &options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::embedding::HashingEmbedder;
    use crate::store::MemoryStore;

    fn plugin() -> SearchPlugin {
        let db = VectorDatabase::new(
            Arc::new(MemoryStore::new()),
            Arc::new(HashingEmbedder::default()),
            Settings::default(),
        );
        SearchPlugin::new(Arc::new(db))
    }

    #[test]
    fn descriptors_name_both_functions() {
        let names: Vec<_> = plugin().functions().iter().map(|f| f.name).collect();
        assert_eq!(names, vec![SEARCH_MANIFESTS, SEARCH_EVENTS]);
    }

    #[tokio::test]
    async fn unknown_function_is_rejected() {
        let err = plugin().invoke("drop_tables", "x").await.unwrap_err();
        assert!(matches!(err, Error::UnknownFunction(ref f) if f == "drop_tables"));
    }

    #[tokio::test]
    async fn search_before_initialize_fails() {
        let err = plugin().search_events("process start").await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
    }
}
