//! Mapping between field maps and user row types.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use kvtab_types::{FieldMap, FieldValues};

use crate::error::{TableError, TableResult};
use crate::hints::{FieldType, TableHints};

/// Turns row values into field maps and back.
pub trait RowCodec: Send + Sync {
    /// Flatten `value` into columns. `None` marks a column to delete.
    fn encode<T: Serialize>(&self, value: &T) -> TableResult<FieldValues>;

    /// Build a `T` from stored columns.
    ///
    /// Columns are applied one by one on top of `T::default()`. A column
    /// that cannot be coerced is logged and skipped.
    fn decode<T>(&self, fields: &FieldMap, hints: &TableHints) -> TableResult<T>
    where
        T: Serialize + DeserializeOwned + Default;
}

/// [`RowCodec`] built on `serde_json` values.
///
/// Scalars are stored as their text, nested values as JSON text.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerdeRowCodec;

impl RowCodec for SerdeRowCodec {
    fn encode<T: Serialize>(&self, value: &T) -> TableResult<FieldValues> {
        let value = serde_json::to_value(value).map_err(|e| TableError::Codec(e.to_string()))?;
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(TableError::UnsupportedShape(format!(
                    "expected a struct or map, got {}",
                    kind_name(&other)
                )))
            }
        };
        Ok(object
            .into_iter()
            .map(|(field, value)| (field, encode_value(value)))
            .collect())
    }

    fn decode<T>(&self, fields: &FieldMap, hints: &TableHints) -> TableResult<T>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let base = serde_json::to_value(T::default()).map_err(|e| TableError::Codec(e.to_string()))?;
        let mut object = match base {
            Value::Object(object) => object,
            other => {
                return Err(TableError::UnsupportedShape(format!(
                    "row type is not a struct or map: {}",
                    kind_name(&other)
                )))
            }
        };

        for (field, text) in fields {
            let hint = hints.get(field).copied();
            let candidates = coerce(text, hint, object.get(field));
            if !apply_first::<T>(&mut object, field, candidates) {
                warn!(field = %field, value = %text, "field skipped: cannot coerce");
            }
        }

        serde_json::from_value(Value::Object(object)).map_err(|e| TableError::Codec(e.to_string()))
    }
}

fn encode_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Try each candidate in turn, keeping the first that `T` accepts.
fn apply_first<T>(object: &mut Map<String, Value>, field: &str, candidates: Vec<Value>) -> bool
where
    T: DeserializeOwned,
{
    let previous = object.get(field).cloned();
    for candidate in candidates {
        object.insert(field.to_string(), candidate);
        if serde_json::from_value::<T>(Value::Object(object.clone())).is_ok() {
            return true;
        }
    }
    match previous {
        Some(value) => object.insert(field.to_string(), value),
        None => object.remove(field),
    };
    false
}

/// Candidate JSON values for a stored text, most likely first.
fn coerce(text: &str, hint: Option<FieldType>, slot: Option<&Value>) -> Vec<Value> {
    let kind = hint.or_else(|| slot.and_then(slot_kind));
    match kind {
        Some(FieldType::Text) => vec![Value::String(text.to_string())],
        Some(FieldType::Integer) => integer(text).into_iter().collect(),
        Some(FieldType::Float) => float(text).into_iter().collect(),
        Some(FieldType::Boolean) => boolean(text).into_iter().collect(),
        Some(FieldType::Json) => serde_json::from_str(text).into_iter().collect(),
        None => {
            // Unknown slot type (e.g. an `Option` holding `None`): try the
            // parsed value first, then the raw text.
            let mut candidates: Vec<Value> = serde_json::from_str(text).into_iter().collect();
            candidates.push(Value::String(text.to_string()));
            candidates
        }
    }
}

fn slot_kind(slot: &Value) -> Option<FieldType> {
    match slot {
        Value::String(_) => Some(FieldType::Text),
        Value::Bool(_) => Some(FieldType::Boolean),
        Value::Number(n) if n.is_f64() => Some(FieldType::Float),
        Value::Number(_) => Some(FieldType::Integer),
        Value::Array(_) | Value::Object(_) => Some(FieldType::Json),
        Value::Null => None,
    }
}

fn integer(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(Value::from(n));
    }
    text.parse::<u64>().ok().map(Value::from)
}

fn float(text: &str) -> Option<Value> {
    text.trim()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

fn boolean(text: &str) -> Option<Value> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(Value::Bool(true)),
        "false" | "0" | "no" => Some(Value::Bool(false)),
        _ => None,
    }
}
