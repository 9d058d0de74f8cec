//! Static collection definitions: payload fields plus the one named vector.
//! Points are always keyed by the record id.

use std::collections::BTreeMap;

use crate::vector::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Single string value.
    Keyword,
    /// Free text, indexed for full-text matching when searchable.
    Text,
    StringList,
    IntegerList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataField {
    pub name: &'static str,
    pub field_type: FieldType,
    pub filterable: bool,
    pub searchable: bool,
}

impl DataField {
    pub const fn keyword(name: &'static str) -> Self {
        Self { name, field_type: FieldType::Keyword, filterable: true, searchable: false }
    }

    pub const fn text(name: &'static str) -> Self {
        Self { name, field_type: FieldType::Text, filterable: false, searchable: true }
    }

    pub const fn string_list(name: &'static str) -> Self {
        Self { name, field_type: FieldType::StringList, filterable: true, searchable: false }
    }

    pub const fn integer_list(name: &'static str) -> Self {
        Self { name, field_type: FieldType::IntegerList, filterable: true, searchable: false }
    }

    pub const fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    /// Searchable fields get a full-text index; other filterable fields a
    /// keyword or integer index.
    pub fn index(&self) -> Option<PayloadIndex> {
        match (self.field_type, self.filterable, self.searchable) {
            (_, _, true) => Some(PayloadIndex::Text),
            (FieldType::IntegerList, true, false) => Some(PayloadIndex::Integer),
            (_, true, false) => Some(PayloadIndex::Keyword),
            (_, false, false) => None,
        }
    }
}

/// Payload index kinds, named as the store reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadIndex {
    Keyword,
    Integer,
    Text,
}

impl PayloadIndex {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadIndex::Keyword => "keyword",
            PayloadIndex::Integer => "integer",
            PayloadIndex::Text => "text",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "keyword" => Some(PayloadIndex::Keyword),
            "integer" => Some(PayloadIndex::Integer),
            "text" => Some(PayloadIndex::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Graph-based approximate nearest neighbor.
    Hnsw { m: usize, ef_construct: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorField {
    pub name: &'static str,
    pub dimension: usize,
    pub index: IndexKind,
    pub distance: Metric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSchema {
    pub data_fields: &'static [DataField],
    pub vector: VectorField,
}

impl CollectionSchema {
    pub fn field(&self, name: &str) -> Option<&DataField> {
        self.data_fields.iter().find(|f| f.name == name)
    }

    /// The payload indexes a collection built from this schema carries.
    pub fn payload_indexes(&self) -> BTreeMap<String, PayloadIndex> {
        self.data_fields
            .iter()
            .filter_map(|f| f.index().map(|kind| (f.name.to_string(), kind)))
            .collect()
    }

    /// Compares against the payload indexes an existing collection reports.
    pub fn check_payload(&self, live: &BTreeMap<String, PayloadIndex>) -> Result<(), String> {
        for (name, kind) in live {
            match self.field(name).and_then(DataField::index) {
                Some(expected) if expected == *kind => {}
                Some(expected) => {
                    return Err(format!(
                        "payload field '{}' is indexed as {}, expected {}",
                        name,
                        kind.as_str(),
                        expected.as_str()
                    ))
                }
                None => return Err(format!("unexpected payload index on '{}'", name)),
            }
        }
        for (name, kind) in self.payload_indexes() {
            if !live.contains_key(&name) {
                return Err(format!("payload field '{}' has no {} index", name, kind.as_str()));
            }
        }
        Ok(())
    }

    /// Compares against the vector parameters an existing collection reports.
    pub fn check_vector(&self, dimension: usize, distance: Metric) -> Result<(), String> {
        if dimension != self.vector.dimension {
            return Err(format!(
                "vector '{}' has dimension {}, expected {}",
                self.vector.name, dimension, self.vector.dimension
            ));
        }
        if distance != self.vector.distance {
            return Err(format!(
                "vector '{}' uses {:?} distance, expected {:?}",
                self.vector.name, distance, self.vector.distance
            ));
        }
        Ok(())
    }
}
