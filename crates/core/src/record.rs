//! Record snapshots handed to the console by a data source.
//!
//! A record is an opaque JSON object with a stable `id`. The console never
//! mutates records; changes go back through the data source.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};
use crate::types::RecordId;

/// Name of the identity field every record must carry.
pub const ID_FIELD: &str = "id";

/// One domain entity (order, product, category, user, commission rate...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Map<String, Value>,
}

impl Record {
    /// Build a record from field pairs. The `id` is also stored in `fields`
    /// so path lookups on `"id"` behave like any other column.
    pub fn new(id: impl Into<RecordId>, fields: Map<String, Value>) -> Self {
        let id = id.into();
        let mut fields = fields;
        fields.insert(ID_FIELD.to_string(), serde_json::to_value(&id).unwrap_or(Value::Null));
        Self { id, fields }
    }

    /// Parse a JSON object into a record.
    ///
    /// `position` is only used for error reporting.
    pub fn from_json(value: Value, position: usize) -> CoreResult<Self> {
        let Value::Object(fields) = value else {
            return Err(CoreError::InvalidRecord {
                position,
                reason: "record must be a JSON object".into(),
            });
        };
        let id = fields
            .get(ID_FIELD)
            .and_then(RecordId::from_json)
            .ok_or_else(|| CoreError::InvalidRecord {
                position,
                reason: "missing or malformed `id` (integer or non-empty string required)".into(),
            })?;
        Ok(Self { id, fields })
    }

    /// Look up a value by dotted path (`customer.email`).
    ///
    /// Returns `None` when any segment is absent or traverses a non-object.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

/// Parse a JSON array into records, rejecting duplicate ids.
pub fn records_from_json(value: Value) -> CoreResult<Vec<Record>> {
    let Value::Array(items) = value else {
        return Err(CoreError::Validation(
            "record collection must be a JSON array".into(),
        ));
    };

    let mut seen = HashSet::with_capacity(items.len());
    let mut records = Vec::with_capacity(items.len());
    for (position, item) in items.into_iter().enumerate() {
        let record = Record::from_json(item, position)?;
        if !seen.insert(record.id.clone()) {
            return Err(CoreError::DuplicateId(record.id));
        }
        records.push(record);
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
