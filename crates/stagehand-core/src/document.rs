//! The configuration document and its merge rules.

use crate::{Result, StagehandError};
use serde_json::{Map, Value};

/// A configuration document: option name to JSON value.
///
/// Backed by `serde_json::Map`, which keeps keys sorted, so serialized
/// output is deterministic.
pub type Document = Map<String, Value>;

/// Recursively merge `source` into `target`.
///
/// Mappings present on both sides are merged key by key; every other value
/// (scalars, arrays, or a mapping replacing a non-mapping) is last-write-wins.
pub fn deep_merge(target: &mut Document, source: Document) {
    for (key, value) in source {
        match value {
            Value::Object(incoming) => match target.get_mut(&key) {
                Some(Value::Object(existing)) => deep_merge(existing, incoming),
                _ => {
                    target.insert(key, Value::Object(incoming));
                }
            },
            other => {
                target.insert(key, other);
            }
        }
    }
}

/// Unwrap a configuration source into a document, rejecting non-mappings.
pub fn into_document(source: Value) -> Result<Document> {
    match source {
        Value::Object(map) => Ok(map),
        other => Err(StagehandError::InvalidSource(format!(
            "expected a mapping, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}
