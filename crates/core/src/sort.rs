//! Sort engine.
//!
//! Orders records by a list of `(field, direction)` keys evaluated in turn,
//! then by record id ascending so the order is total and pagination is
//! reproducible across renders.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::field::{FieldRegistry, FieldSpec, FieldType, FieldValue};
use crate::record::Record;

// ---------------------------------------------------------------------------
// SortState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// One `(field, direction)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// The single active sort of a view. An empty key list orders by id only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub keys: Vec<SortKey>,
}

impl SortState {
    pub fn by(key: SortKey) -> Self {
        Self { keys: vec![key] }
    }

    pub fn then(mut self, key: SortKey) -> Self {
        self.keys.push(key);
        self
    }

    /// Header-click behavior: clicking the primary column flips its
    /// direction, clicking another column makes it the only key, ascending.
    pub fn toggled(&self, field: &str) -> Self {
        match self.keys.first() {
            Some(primary) if primary.field == field => Self::by(SortKey {
                field: field.to_string(),
                direction: primary.direction.reversed(),
            }),
            _ => Self::by(SortKey::asc(field)),
        }
    }
}

// ---------------------------------------------------------------------------
// SortEngine
// ---------------------------------------------------------------------------

/// A [`SortState`] with every field resolved against the registry.
#[derive(Debug, Clone)]
pub struct SortEngine {
    keys: Vec<(FieldSpec, SortDirection)>,
}

impl SortEngine {
    pub fn new(registry: &FieldRegistry, state: &SortState) -> CoreResult<Self> {
        let keys = state
            .keys
            .iter()
            .map(|key| registry.get(&key.field).map(|spec| (spec.clone(), key.direction)))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self { keys })
    }

    /// Total order over records: keys in turn, then id ascending.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.keys
            .iter()
            .map(|(spec, direction)| {
                direction.apply(compare_values(spec, &spec.extract(a), &spec.extract(b)))
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }

    /// Sort borrowed records in place. Keys are extracted once per record.
    pub fn sort(&self, records: &mut Vec<&Record>) {
        let mut keyed: Vec<(Vec<FieldValue>, &Record)> = records
            .drain(..)
            .map(|r| (self.keys.iter().map(|(spec, _)| spec.extract(r)).collect(), r))
            .collect();

        keyed.sort_by(|(ka, a), (kb, b)| {
            self.keys
                .iter()
                .zip(ka.iter().zip(kb.iter()))
                .map(|((spec, direction), (va, vb))| direction.apply(compare_values(spec, va, vb)))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.id.cmp(&b.id))
        });

        records.extend(keyed.into_iter().map(|(_, r)| r));
    }
}

/// Type-aware comparison of two extracted values. `Missing` is the minimum.
pub fn compare_values(spec: &FieldSpec, a: &FieldValue, b: &FieldValue) -> Ordering {
    match (a, b) {
        (FieldValue::Missing, FieldValue::Missing) => Ordering::Equal,
        (FieldValue::Missing, _) => Ordering::Less,
        (_, FieldValue::Missing) => Ordering::Greater,
        (FieldValue::Number(x), FieldValue::Number(y)) => x.total_cmp(y),
        (FieldValue::Date(x), FieldValue::Date(y)) => x.cmp(y),
        (FieldValue::Bool(x), FieldValue::Bool(y)) => x.cmp(y),
        (FieldValue::Text(x), FieldValue::Text(y)) => {
            if spec.field_type() == FieldType::Enum && spec.has_rank_order() {
                // Unranked values sit below every ranked value.
                spec.rank_of(x)
                    .cmp(&spec.rank_of(y))
                    .then_with(|| compare_text(x, y))
            } else {
                compare_text(x, y)
            }
        }
        _ => variant_rank(a).cmp(&variant_rank(b)),
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Fallback ordering for mixed value kinds produced by custom extractors.
fn variant_rank(value: &FieldValue) -> u8 {
    match value {
        FieldValue::Missing => 0,
        FieldValue::Bool(_) => 1,
        FieldValue::Number(_) => 2,
        FieldValue::Date(_) => 3,
        FieldValue::Text(_) => 4,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
