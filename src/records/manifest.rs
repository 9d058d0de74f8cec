use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::{join_or_none, or_default, parse_key, PointMapper, VectorRecord, UNKNOWN, UNNAMED};
use crate::codec::{self, IntegerParsePolicy};
use crate::domain::{ManifestTask, ParsedEtwManifest};
use crate::embedding::EmbeddingGenerator;
use crate::error::Result;
use crate::factory::MapperEntry;
use crate::model::{Point, RecordKind, DESCRIPTION_VECTOR, VECTOR_DIM};
use crate::schema::{CollectionSchema, DataField, IndexKind, VectorField};
use crate::vector::Metric;

// Payload field names
pub const PROVIDER_NAME: &str = "provider_name";
pub const SOURCE: &str = "source";
pub const EVENT_IDS: &str = "event_ids";
pub const CHANNELS: &str = "channels";
pub const TASKS: &str = "tasks";
pub const KEYWORDS: &str = "keywords";
pub const STRINGS: &str = "strings";
pub const TEMPLATE_FIELDS: &str = "template_fields";
pub const DESCRIPTION: &str = "description";

pub const MANIFEST_SCHEMA: CollectionSchema = CollectionSchema {
    data_fields: &[
        DataField::keyword(PROVIDER_NAME).searchable(),
        DataField::keyword(SOURCE),
        DataField::integer_list(EVENT_IDS),
        DataField::string_list(CHANNELS),
        DataField::string_list(TASKS).searchable(),
        DataField::string_list(KEYWORDS),
        DataField::string_list(STRINGS).searchable(),
        DataField::string_list(TEMPLATE_FIELDS).searchable(),
        DataField::text(DESCRIPTION),
    ],
    vector: VectorField {
        name: DESCRIPTION_VECTOR,
        dimension: VECTOR_DIM,
        index: IndexKind::Hnsw { m: 16, ef_construct: 100 },
        distance: Metric::Cosine,
    },
};

/// Description of one trace provider, as declared by its manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestRecord {
    pub id: Uuid,
    pub provider_name: String,
    pub source: String,
    pub event_ids: Vec<String>,
    pub channels: Vec<String>,
    pub tasks: Vec<String>,
    pub keywords: Vec<String>,
    pub strings: Vec<String>,
    pub template_fields: Vec<String>,
    pub description: String,
    pub description_embedding: Vec<f32>,
}

impl ManifestRecord {
    /// Every field except the embedding, from a parsed manifest. New id each call.
    pub fn describe(manifest: &ParsedEtwManifest) -> Self {
        let mut record = Self {
            id: Uuid::new_v4(),
            provider_name: or_default(manifest.provider_name.as_deref(), UNNAMED),
            source: or_default(manifest.source.as_deref(), UNKNOWN),
            event_ids: manifest.events.iter().map(|e| e.id.to_string()).collect(),
            channels: manifest.channels.clone(),
            tasks: manifest.tasks.iter().map(render_task).collect(),
            keywords: manifest.keywords.clone(),
            strings: manifest.strings.clone(),
            template_fields: dedup_fields(manifest),
            description: String::new(),
            description_embedding: Vec::new(),
        };
        record.description = record.build_description();
        record
    }

    /// Deterministic paragraph over all descriptive fields.
    pub fn build_description(&self) -> String {
        format!(
            "The ETW provider {} is declared in {}. It defines {} events with identifiers {}. \
             Its channels are {}. Its tasks are: {}. Its keywords are {}. \
             Its event templates carry the fields {}. Its string table contains {}.",
            self.provider_name,
            self.source,
            self.event_ids.len(),
            join_or_none(&self.event_ids),
            join_or_none(&self.channels),
            join_or_none(&self.tasks),
            join_or_none(&self.keywords),
            join_or_none(&self.template_fields),
            join_or_none(&self.strings),
        )
    }
}

fn render_task(task: &ManifestTask) -> String {
    format!("task {}(value={}) has opcodes {}", task.name, task.value, join_or_none(&task.opcodes))
}

/// Field names across all templates, first occurrence wins.
fn dedup_fields(manifest: &ParsedEtwManifest) -> Vec<String> {
    let mut seen = HashSet::new();
    manifest
        .templates
        .iter()
        .flat_map(|t| t.fields.iter())
        .filter(|f| seen.insert(f.as_str()))
        .cloned()
        .collect()
}

#[async_trait]
impl VectorRecord for ManifestRecord {
    type Source = ParsedEtwManifest;

    const KIND: RecordKind = RecordKind::Manifest;
    const SCHEMA: CollectionSchema = MANIFEST_SCHEMA;

    async fn from_domain_object(source: &ParsedEtwManifest, embedder: &dyn EmbeddingGenerator) -> Result<Self> {
        let mut record = Self::describe(source);
        record.description_embedding = embedder.generate_embedding(&record.description).await?;
        Ok(record)
    }

    fn from_stored_point(point: &Point) -> Self {
        let payload = &point.payload;
        Self {
            id: parse_key(&point.key),
            provider_name: codec::extract_scalar(payload, PROVIDER_NAME, UNNAMED),
            source: codec::extract_scalar(payload, SOURCE, UNKNOWN),
            event_ids: codec::extract_strings(payload, EVENT_IDS),
            channels: codec::extract_strings(payload, CHANNELS),
            tasks: codec::extract_strings(payload, TASKS),
            keywords: codec::extract_strings(payload, KEYWORDS),
            strings: codec::extract_strings(payload, STRINGS),
            template_fields: codec::extract_strings(payload, TEMPLATE_FIELDS),
            description: codec::extract_scalar(payload, DESCRIPTION, ""),
            description_embedding: point.vector(DESCRIPTION_VECTOR).map(<[f32]>::to_vec).unwrap_or_default(),
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn embedding(&self) -> &[f32] {
        &self.description_embedding
    }

    fn select_mapper(entry: &MapperEntry) -> Option<Arc<dyn PointMapper<Self>>> {
        match entry {
            MapperEntry::Manifest(mapper) => Some(mapper.clone()),
            MapperEntry::Event(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestMapper {
    pub integer_policy: IntegerParsePolicy,
}

impl PointMapper<ManifestRecord> for ManifestMapper {
    fn to_storage_point(&self, record: &ManifestRecord) -> Point {
        let mut point = Point::new(record.id.to_string());
        let payload = &mut point.payload;
        payload.insert(PROVIDER_NAME.into(), codec::scalar(&record.provider_name));
        payload.insert(SOURCE.into(), codec::scalar(&record.source));
        payload.insert(EVENT_IDS.into(), codec::integer_list(&record.event_ids, self.integer_policy));
        payload.insert(CHANNELS.into(), codec::string_list(&record.channels));
        payload.insert(TASKS.into(), codec::string_list(&record.tasks));
        payload.insert(KEYWORDS.into(), codec::string_list(&record.keywords));
        payload.insert(STRINGS.into(), codec::string_list(&record.strings));
        payload.insert(TEMPLATE_FIELDS.into(), codec::string_list(&record.template_fields));
        payload.insert(DESCRIPTION.into(), codec::scalar(&record.description));
        point.vectors.insert(DESCRIPTION_VECTOR.into(), record.description_embedding.clone());
        point
    }

    fn from_storage_point(&self, point: &Point) -> ManifestRecord {
        ManifestRecord::from_stored_point(point)
    }
}
