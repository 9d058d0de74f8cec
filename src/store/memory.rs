use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use ordered_float::OrderedFloat;

use super::{CollectionInfo, NearestQuery, ScrollPage, StoreError, StoreResult, VectorParams, VectorStore};
use crate::model::{Point, ScoredPoint};
use crate::schema::CollectionSchema;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    score: OrderedFloat<f32>,
    key: String,
}

// Higher score wins; ties go to the smaller key so results are stable
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.cmp(&other.score).then_with(|| other.key.cmp(&self.key))
    }
}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct MemoryCollection {
    schema: CollectionSchema,
    points: BTreeMap<String, Point>,
}

/// In-process vector store with brute-force search.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.collections.read().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("MemoryStore").field("collections", &count).finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> StoreResult<()> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        if collections.contains_key(name) {
            return Err(StoreError::Rejected(format!("Collection '{}' already exists", name)));
        }
        collections.insert(name.to_string(), MemoryCollection { schema: *schema, points: BTreeMap::new() });
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> StoreResult<Option<CollectionInfo>> {
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        Ok(collections.get(name).map(|c| {
            let mut vectors = BTreeMap::new();
            vectors.insert(
                c.schema.vector.name.to_string(),
                VectorParams { dimension: c.schema.vector.dimension, distance: c.schema.vector.distance },
            );
            CollectionInfo { points: c.points.len() as u64, vectors, payload: c.schema.payload_indexes() }
        }))
    }

    async fn delete_collection(&self, name: &str) -> StoreResult<()> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<Point>) -> StoreResult<()> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| StoreError::CollectionMissing(name.to_string()))?;

        let field = collection.schema.vector;
        // Validate the whole batch before applying any of it
        for point in &points {
            if let Some(v) = point.vector(field.name) {
                if v.len() != field.dimension {
                    return Err(StoreError::Rejected(format!(
                        "Vector dimension error: expected dim: {}, got {}",
                        field.dimension,
                        v.len()
                    )));
                }
            }
        }
        for point in points {
            collection.points.insert(point.key.clone(), point);
        }
        Ok(())
    }

    async fn count(&self, name: &str) -> StoreResult<u64> {
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        Ok(collections.get(name).map(|c| c.points.len() as u64).unwrap_or(0))
    }

    async fn query(&self, name: &str, query: &NearestQuery) -> StoreResult<Vec<ScoredPoint>> {
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        let collection = collections
            .get(name)
            .ok_or_else(|| StoreError::CollectionMissing(name.to_string()))?;

        let field = collection.schema.vector;
        if query.vector_field != field.name {
            return Err(StoreError::Rejected(format!("Not existing vector name: {}", query.vector_field)));
        }
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        // Min-heap of the best `limit` candidates seen so far
        let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(query.limit + 1);
        for (key, point) in &collection.points {
            let Some(vector) = point.vector(field.name) else { continue };
            let score = field.distance.score(&query.vector, vector);
            if query.score_threshold.is_some_and(|t| score < t) {
                continue;
            }
            heap.push(Reverse(Candidate { score: OrderedFloat(score), key: key.clone() }));
            if heap.len() > query.limit {
                heap.pop();
            }
        }

        let mut ranked: Vec<Candidate> = heap.into_iter().map(|Reverse(c)| c).collect();
        ranked.sort_by(|a, b| b.cmp(a));

        Ok(ranked
            .into_iter()
            .filter_map(|c| {
                let mut point = collection.points.get(&c.key)?.clone();
                if !query.with_vectors {
                    point.vectors.clear();
                }
                Some(ScoredPoint { point, score: c.score.into_inner() })
            })
            .collect())
    }

    async fn scroll(&self, name: &str, offset: Option<String>, limit: usize) -> StoreResult<ScrollPage> {
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        let collection = collections
            .get(name)
            .ok_or_else(|| StoreError::CollectionMissing(name.to_string()))?;

        let mut iter = match &offset {
            Some(start) => collection.points.range(start.clone()..),
            None => collection.points.range::<String, _>(..),
        };

        let points: Vec<Point> = iter.by_ref().take(limit.max(1)).map(|(_, p)| p.clone()).collect();
        let next_offset = iter.next().map(|(k, _)| k.clone());
        Ok(ScrollPage { points, next_offset })
    }
}
