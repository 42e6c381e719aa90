//! Field accessor registry.
//!
//! Maps logical column names to extractors over a [`Record`]. Stored
//! columns, nested paths (`customer.email`) and computed columns (waiting
//! time) all go through the same [`FieldSpec`] so the predicate, sort and
//! export engines never care where a value comes from.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Field types and values
// ---------------------------------------------------------------------------

/// How values of a field are interpreted for filtering and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Enum,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Enum => "enum",
        }
    }
}

/// A value extracted from a record, already coerced to its field type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Missing,
    Text(String),
    Number(f64),
    Date(Timestamp),
    Bool(bool),
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// String form used by search and export. `Missing` renders empty.
    pub fn display(&self) -> String {
        match self {
            Self::Missing => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Date(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
            Self::Bool(b) => b.to_string(),
        }
    }

    /// Coerce a raw JSON value into the representation for `field_type`.
    ///
    /// Values that cannot be interpreted as the declared type become
    /// `Missing` rather than failing.
    pub fn coerce(raw: Option<&Value>, field_type: FieldType) -> Self {
        let Some(raw) = raw else {
            return Self::Missing;
        };
        if raw.is_null() {
            return Self::Missing;
        }

        match field_type {
            FieldType::Text | FieldType::Enum => match raw {
                Value::String(s) => Self::Text(s.clone()),
                Value::Number(n) => Self::Text(n.to_string()),
                Value::Bool(b) => Self::Text(b.to_string()),
                Value::Array(items) => {
                    let parts: Vec<String> = items
                        .iter()
                        .filter_map(|v| match v {
                            Value::String(s) => Some(s.clone()),
                            Value::Number(n) => Some(n.to_string()),
                            Value::Bool(b) => Some(b.to_string()),
                            _ => None,
                        })
                        .collect();
                    if parts.is_empty() {
                        Self::Missing
                    } else {
                        Self::Text(parts.join(", "))
                    }
                }
                Value::Object(_) => Self::Text(raw.to_string()),
                Value::Null => Self::Missing,
            },
            FieldType::Number => match raw {
                Value::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Missing),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(Self::Number)
                    .unwrap_or(Self::Missing),
                _ => Self::Missing,
            },
            FieldType::Date => match raw {
                Value::String(s) => parse_timestamp(s).map(Self::Date).unwrap_or(Self::Missing),
                Value::Number(n) => n
                    .as_i64()
                    .and_then(DateTime::from_timestamp_millis)
                    .map(Self::Date)
                    .unwrap_or(Self::Missing),
                _ => Self::Missing,
            },
        }
    }
}

/// Render a number without a trailing `.0` when it is integral.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Parse the timestamp shapes hosted backends emit.
///
/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS[.f]` / `YYYY-MM-DDTHH:MM:SS[.f]`
/// (assumed UTC) and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// FieldSpec
// ---------------------------------------------------------------------------

/// Extraction function shared between clones of a [`FieldSpec`].
pub type Extractor = Arc<dyn Fn(&Record) -> FieldValue + Send + Sync>;

/// Named accessor plus type describing how to pull a comparable value out
/// of a record.
#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    field_type: FieldType,
    extract: Extractor,
    /// Lower-cased enum value -> rank. Only meaningful for `Enum` fields.
    ranks: Option<HashMap<String, i64>>,
}

impl FieldSpec {
    pub fn new<F>(name: impl Into<String>, field_type: FieldType, extract: F) -> Self
    where
        F: Fn(&Record) -> FieldValue + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            field_type,
            extract: Arc::new(extract),
            ranks: None,
        }
    }

    /// Accessor reading a (possibly dotted) JSON path and coercing it.
    pub fn from_path(name: impl Into<String>, path: impl Into<String>, field_type: FieldType) -> Self {
        let path = path.into();
        Self::new(name, field_type, move |record: &Record| {
            FieldValue::coerce(record.lookup(&path), field_type)
        })
    }

    /// Attach an explicit rank order used when sorting enum values.
    pub fn with_rank_order<I, S>(mut self, ranks: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        self.ranks = Some(
            ranks
                .into_iter()
                .map(|(value, rank)| (value.as_ref().to_lowercase(), rank))
                .collect(),
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn extract(&self, record: &Record) -> FieldValue {
        (self.extract)(record)
    }

    pub fn has_rank_order(&self) -> bool {
        self.ranks.is_some()
    }

    /// Rank of an enum value, case-insensitive.
    pub fn rank_of(&self, value: &str) -> Option<i64> {
        self.ranks.as_ref()?.get(&value.to_lowercase()).copied()
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("ranks", &self.ranks)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// FieldRegistry
// ---------------------------------------------------------------------------

/// Registry of every column a view may filter, sort, search or export on.
///
/// Registration is last-writer-wins: views routinely redefine what a
/// column means.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: HashMap<String, FieldSpec>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a field backed by an arbitrary extractor.
    pub fn register<F>(&mut self, name: impl Into<String>, field_type: FieldType, extract: F) -> &mut Self
    where
        F: Fn(&Record) -> FieldValue + Send + Sync + 'static,
    {
        self.register_spec(FieldSpec::new(name, field_type, extract))
    }

    /// Register (or replace) a field reading a JSON path.
    pub fn register_path(
        &mut self,
        name: impl Into<String>,
        path: impl Into<String>,
        field_type: FieldType,
    ) -> &mut Self {
        self.register_spec(FieldSpec::from_path(name, path, field_type))
    }

    pub fn register_spec(&mut self, spec: FieldSpec) -> &mut Self {
        self.fields.insert(spec.name.clone(), spec);
        self
    }

    pub fn get(&self, name: &str) -> CoreResult<&FieldSpec> {
        self.fields
            .get(name)
            .ok_or_else(|| CoreError::UnknownField(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Registered names, sorted for stable output.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
