use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::{join_or_none, or_default, parse_key, PointMapper, VectorRecord, UNKNOWN, UNNAMED};
use crate::codec;
use crate::domain::ParsedEtwEvent;
use crate::embedding::EmbeddingGenerator;
use crate::error::Result;
use crate::factory::MapperEntry;
use crate::model::{Point, RecordKind, DESCRIPTION_VECTOR, VECTOR_DIM};
use crate::schema::{CollectionSchema, DataField, IndexKind, VectorField};
use crate::vector::Metric;

pub const PROVIDER_NAME: &str = "provider_name";
pub const SOURCE: &str = "source";
pub const EVENT_ID: &str = "event_id";
pub const VERSION: &str = "version";
pub const LEVEL: &str = "level";
pub const TASK: &str = "task";
pub const OPCODE: &str = "opcode";
pub const CHANNEL: &str = "channel";
pub const KEYWORDS: &str = "keywords";
pub const PROPERTIES: &str = "properties";
pub const DESCRIPTION: &str = "description";

pub const EVENT_SCHEMA: CollectionSchema = CollectionSchema {
    data_fields: &[
        DataField::keyword(PROVIDER_NAME).searchable(),
        DataField::keyword(SOURCE),
        DataField::keyword(EVENT_ID),
        DataField::keyword(VERSION),
        DataField::keyword(LEVEL),
        DataField::keyword(TASK),
        DataField::keyword(OPCODE),
        DataField::keyword(CHANNEL),
        DataField::string_list(KEYWORDS),
        DataField::string_list(PROPERTIES).searchable(),
        DataField::text(DESCRIPTION),
    ],
    vector: VectorField {
        name: DESCRIPTION_VECTOR,
        dimension: VECTOR_DIM,
        index: IndexKind::Hnsw { m: 16, ef_construct: 100 },
        distance: Metric::Cosine,
    },
};

/// Description of a single captured trace event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: Uuid,
    pub provider_name: String,
    pub source: String,
    pub event_id: String,
    pub version: String,
    pub level: String,
    pub task: String,
    pub opcode: String,
    pub channel: String,
    pub keywords: Vec<String>,
    /// `name=value` pairs in payload order.
    pub properties: Vec<String>,
    pub description: String,
    pub description_embedding: Vec<f32>,
}

impl EventRecord {
    pub fn describe(event: &ParsedEtwEvent) -> Self {
        let mut record = Self {
            id: Uuid::new_v4(),
            provider_name: or_default(event.provider_name.as_deref(), UNNAMED),
            source: or_default(event.source.as_deref(), UNKNOWN),
            event_id: event.event_id.to_string(),
            version: event.version.to_string(),
            level: or_default(event.level.as_deref(), UNKNOWN),
            task: or_default(event.task.as_deref(), UNKNOWN),
            opcode: or_default(event.opcode.as_deref(), UNKNOWN),
            channel: or_default(event.channel.as_deref(), UNKNOWN),
            keywords: event.keywords.clone(),
            properties: event.properties.iter().map(|p| format!("{}={}", p.name, p.value)).collect(),
            description: String::new(),
            description_embedding: Vec::new(),
        };
        record.description = record.build_description();
        record
    }

    pub fn build_description(&self) -> String {
        format!(
            "Event {} version {} of the ETW provider {} was recorded in {}. \
             It is logged at level {} on channel {} under task {} with opcode {}. \
             Its keywords are {}. Its payload fields are {}.",
            self.event_id,
            self.version,
            self.provider_name,
            self.source,
            self.level,
            self.channel,
            self.task,
            self.opcode,
            join_or_none(&self.keywords),
            join_or_none(&self.properties),
        )
    }
}

#[async_trait]
impl VectorRecord for EventRecord {
    type Source = ParsedEtwEvent;

    const KIND: RecordKind = RecordKind::Event;
    const SCHEMA: CollectionSchema = EVENT_SCHEMA;

    async fn from_domain_object(source: &ParsedEtwEvent, embedder: &dyn EmbeddingGenerator) -> Result<Self> {
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
            event_id: codec::extract_scalar(payload, EVENT_ID, UNKNOWN),
            version: codec::extract_scalar(payload, VERSION, UNKNOWN),
            level: codec::extract_scalar(payload, LEVEL, UNKNOWN),
            task: codec::extract_scalar(payload, TASK, UNKNOWN),
            opcode: codec::extract_scalar(payload, OPCODE, UNKNOWN),
            channel: codec::extract_scalar(payload, CHANNEL, UNKNOWN),
            keywords: codec::extract_strings(payload, KEYWORDS),
            properties: codec::extract_strings(payload, PROPERTIES),
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
            MapperEntry::Event(mapper) => Some(mapper.clone()),
            MapperEntry::Manifest(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EventMapper;

impl PointMapper<EventRecord> for EventMapper {
    fn to_storage_point(&self, record: &EventRecord) -> Point {
        let mut point = Point::new(record.id.to_string());
        let scalars = [
            (PROVIDER_NAME, &record.provider_name),
            (SOURCE, &record.source),
            (EVENT_ID, &record.event_id),
            (VERSION, &record.version),
            (LEVEL, &record.level),
            (TASK, &record.task),
            (OPCODE, &record.opcode),
            (CHANNEL, &record.channel),
            (DESCRIPTION, &record.description),
        ];
        for (name, value) in scalars {
            point.payload.insert(name.into(), codec::scalar(value));
        }
        point.payload.insert(KEYWORDS.into(), codec::string_list(&record.keywords));
        point.payload.insert(PROPERTIES.into(), codec::string_list(&record.properties));
        point.vectors.insert(DESCRIPTION_VECTOR.into(), record.description_embedding.clone());
        point
    }

    fn from_storage_point(&self, point: &Point) -> EventRecord {
        EventRecord::from_stored_point(point)
    }
}
