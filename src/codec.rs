//! Conversion between record fields and store payload values.
//!
//! Nothing here fails: malformed or missing data degrades to empty values.

use std::collections::BTreeMap;

use tracing::warn;

use crate::model::PayloadValue;

pub type Payload = BTreeMap<String, PayloadValue>;

/// What to do with entries that do not parse as integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegerParsePolicy {
    /// Drop them silently.
    #[default]
    Lossy,
    /// Drop them and log a warning per entry.
    Warn,
}

pub fn string_list(values: &[String]) -> PayloadValue {
    PayloadValue::StringList(values.to_vec())
}

/// Builds an integer list, dropping entries that are not integers. Order is kept.
pub fn integer_list(values: &[String], policy: IntegerParsePolicy) -> PayloadValue {
    let parsed = values
        .iter()
        .filter_map(|v| match v.trim().parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                if policy == IntegerParsePolicy::Warn {
                    warn!(entry = %v, "dropping non-numeric entry from integer list");
                }
                None
            }
        })
        .collect();
    PayloadValue::IntegerList(parsed)
}

pub fn scalar(value: &str) -> PayloadValue {
    PayloadValue::String(value.to_string())
}

/// Reads a named field back as strings. Missing field gives an empty list.
pub fn extract_strings(payload: &Payload, field: &str) -> Vec<String> {
    match payload.get(field) {
        Some(PayloadValue::StringList(items)) => items.clone(),
        Some(PayloadValue::IntegerList(items)) => items.iter().map(i64::to_string).collect(),
        Some(PayloadValue::String(s)) => vec![s.clone()],
        None => Vec::new(),
    }
}

/// Reads a scalar string, falling back to `default` when absent or empty.
pub fn extract_scalar(payload: &Payload, field: &str, default: &str) -> String {
    let value = match payload.get(field) {
        Some(PayloadValue::String(s)) => s.clone(),
        Some(PayloadValue::StringList(items)) => items.first().cloned().unwrap_or_default(),
        Some(PayloadValue::IntegerList(items)) => items.first().map(i64::to_string).unwrap_or_default(),
        None => String::new(),
    };
    if value.is_empty() { default.to_string() } else { value }
}
