//! Already-parsed trace-provider manifests and trace events.
//!
//! Producing these from raw manifests or ETL files happens upstream; the
//! shapes here are what the record types consume.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ParsedEtwManifest {
    #[serde(default)]
    pub provider_name: Option<String>,
    /// Binary or manifest file the provider was read from.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub events: Vec<ManifestEvent>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<ManifestTask>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub strings: Vec<String>,
    #[serde(default)]
    pub templates: Vec<ManifestTemplate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ManifestEvent {
    pub id: u16,
    #[serde(default)]
    pub version: u8,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ManifestTask {
    pub name: String,
    pub value: u16,
    #[serde(default)]
    pub opcodes: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ManifestTemplate {
    pub id: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ParsedEtwEvent {
    #[serde(default)]
    pub provider_name: Option<String>,
    /// Trace file or live session the event came from.
    #[serde(default)]
    pub source: Option<String>,
    pub event_id: u16,
    #[serde(default)]
    pub version: u8,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub opcode: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub properties: Vec<EventProperty>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EventProperty {
    pub name: String,
    #[serde(default)]
    pub value: String,
}
