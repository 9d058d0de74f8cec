use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

// Dimensionality of the sentence embedding model (all-MiniLM class)
pub const VECTOR_DIM: usize = 384;

/// Name of the single named vector every collection carries.
pub const DESCRIPTION_VECTOR: &str = "description_embedding";

/// A payload value as the vector store understands it.
#[derive(Archive, RkyvDeserialize, RkyvSerialize, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
#[serde(untagged)]
pub enum PayloadValue {
    String(String),
    IntegerList(Vec<i64>),
    StringList(Vec<String>),
}

/// The storage unit of the vector store: key, schemaless payload, named vectors.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Point {
    #[serde(rename = "id")]
    pub key: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub payload: BTreeMap<String, PayloadValue>,

    #[serde(rename = "vector", default, deserialize_with = "null_as_default")]
    pub vectors: BTreeMap<String, Vec<f32>>,
}

impl Point {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Default::default() }
    }

    pub fn vector(&self, name: &str) -> Option<&[f32]> {
        self.vectors.get(name).map(Vec::as_slice)
    }
}

// The store sends `null` for payloads or vectors it was not asked for
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(<Option<T> as Deserialize>::deserialize(deserializer)?.unwrap_or_default())
}

/// A point returned by a nearest-neighbor query. Higher score is closer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    #[serde(flatten)]
    pub point: Point,
    pub score: f32,
}

/// Which record domain an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Manifests,
    EventData,
}

impl Topic {
    pub const ALL: [Topic; 2] = [Topic::Manifests, Topic::EventData];
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Manifests => write!(f, "manifests"),
            Topic::EventData => write!(f, "event data"),
        }
    }
}

impl FromStr for Topic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manifests" | "manifest" => Ok(Topic::Manifests),
            "events" | "event" | "eventdata" | "event_data" => Ok(Topic::EventData),
            other => Err(Error::UnknownTopic(other.to_string())),
        }
    }
}

/// The record shape stored in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Manifest,
    Event,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Manifest => write!(f, "manifest"),
            RecordKind::Event => write!(f, "event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_parses_known_names() {
        assert_eq!("MANIFESTS".parse::<Topic>().unwrap(), Topic::Manifests);
        assert_eq!("events".parse::<Topic>().unwrap(), Topic::EventData);
        assert_eq!("EventData".parse::<Topic>().unwrap(), Topic::EventData);
    }

    #[test]
    fn topic_rejects_unknown_names() {
        let err = "providers".parse::<Topic>().unwrap_err();
        assert!(matches!(err, Error::UnknownTopic(name) if name == "providers"));
    }

    #[test]
    fn point_serializes_with_store_field_names() {
        let mut point = Point::new("6f1c0b9e-4f0e-4d5e-9f7e-2b4d7c1a0e11");
        point.payload.insert("name".into(), PayloadValue::String("Kernel".into()));
        point.vectors.insert(DESCRIPTION_VECTOR.into(), vec![0.5, 0.5]);

        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["id"], "6f1c0b9e-4f0e-4d5e-9f7e-2b4d7c1a0e11");
        assert_eq!(json["payload"]["name"], "Kernel");
        assert_eq!(json["vector"][DESCRIPTION_VECTOR][1], 0.5);
    }

    #[test]
    fn scored_point_ignores_extra_store_fields() {
        let json = r#"{"id":"k1","version":3,"score":0.75,
                       "payload":{"ids":[1,2],"tags":["a"]},"vector":{}}"#;
        let hit: ScoredPoint = serde_json::from_str(json).unwrap();
        assert_eq!(hit.point.key, "k1");
        assert_eq!(hit.score, 0.75);
        assert_eq!(hit.point.payload["ids"], PayloadValue::IntegerList(vec![1, 2]));
        assert_eq!(hit.point.payload["tags"], PayloadValue::StringList(vec!["a".into()]));
    }

    #[test]
    fn null_vectors_read_as_empty() {
        let hit: ScoredPoint = serde_json::from_str(r#"{"id":"k","score":1.0,"payload":null,"vector":null}"#).unwrap();
        assert!(hit.point.payload.is_empty());
        assert!(hit.point.vectors.is_empty());
    }
}
