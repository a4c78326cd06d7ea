//! Record <-> hash field encoding.
//!
//! Each top-level field of a record becomes one hash field holding that
//! field's JSON text. Null fields are not stored, so clearing an optional
//! field means deleting its hash field.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::BackendError;

/// Encode a record into hash fields.
pub(crate) fn to_fields<T: Serialize>(record: &T) -> Result<Vec<(String, String)>, BackendError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => map
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(field, value)| -> Result<_, BackendError> {
                Ok((field, serde_json::to_string(&value)?))
            })
            .collect(),
        other => Err(BackendError::Serialization(format!(
            "expected a record object, got {other}"
        ))),
    }
}

/// Decode a record from hash fields. Returns `None` for an empty hash.
pub(crate) fn from_fields<T: DeserializeOwned>(
    fields: HashMap<String, String>,
) -> Result<Option<T>, BackendError> {
    if fields.is_empty() {
        return Ok(None);
    }

    let mut map = Map::with_capacity(fields.len());
    for (field, raw) in fields {
        let value = serde_json::from_str(&raw).map_err(|e| {
            BackendError::Serialization(format!("field '{field}': {e}"))
        })?;
        map.insert(field, value);
    }

    Ok(Some(serde_json::from_value(Value::Object(map))?))
}

/// Encode a single field value.
pub(crate) fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<String, BackendError> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a single field value.
pub(crate) fn decode_value<T: DeserializeOwned>(raw: &str) -> Result<T, BackendError> {
    Ok(serde_json::from_str(raw)?)
}
