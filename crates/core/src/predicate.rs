//! Predicate engine: free-text search plus discrete value filters.
//!
//! `matches = search AND filter_1 AND filter_2 AND ...`. Search is an OR
//! over the configured searchable fields; every discrete filter that is not
//! `all` must hold. Missing values never match a concrete filter and are
//! skipped by search.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::field::{parse_timestamp, FieldRegistry, FieldSpec, FieldType, FieldValue};
use crate::record::Record;

/// Sentinel accepted from the UI meaning "do not filter on this field".
pub const ALL: &str = "all";

// ---------------------------------------------------------------------------
// FilterState
// ---------------------------------------------------------------------------

/// Target of one discrete filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterValue {
    All,
    Equals(String),
}

impl FilterValue {
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case(ALL) {
            Self::All
        } else {
            Self::Equals(value)
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<FilterValue> for String {
    fn from(value: FilterValue) -> Self {
        match value {
            FilterValue::All => ALL.to_string(),
            FilterValue::Equals(s) => s,
        }
    }
}

/// Current search text and discrete filters of a view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub search_text: String,
    #[serde(default)]
    pub discrete_filters: BTreeMap<String, FilterValue>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search_text = text.into();
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.discrete_filters.insert(field.into(), value.into());
        self
    }

    /// Filters that actually constrain the result set.
    pub fn active_filters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.discrete_filters.iter().filter_map(|(field, value)| match value {
            FilterValue::All => None,
            FilterValue::Equals(target) => Some((field.as_str(), target.as_str())),
        })
    }

    /// True when nothing narrows the record set.
    pub fn is_unconstrained(&self) -> bool {
        self.search_text.trim().is_empty() && self.active_filters().next().is_none()
    }
}

// ---------------------------------------------------------------------------
// PredicateEngine
// ---------------------------------------------------------------------------

/// Compiled predicate for one view. Field names are resolved once, at
/// construction, so evaluation never has to report configuration errors.
#[derive(Debug, Clone)]
pub struct PredicateEngine {
    search_fields: Vec<FieldSpec>,
    filter_fields: HashMap<String, FieldSpec>,
}

impl PredicateEngine {
    pub fn new<S, F>(registry: &FieldRegistry, searchable: &[S], filterable: &[F]) -> CoreResult<Self>
    where
        S: AsRef<str>,
        F: AsRef<str>,
    {
        let search_fields = searchable
            .iter()
            .map(|name| registry.get(name.as_ref()).cloned())
            .collect::<CoreResult<Vec<_>>>()?;
        let filter_fields = filterable
            .iter()
            .map(|name| {
                registry
                    .get(name.as_ref())
                    .map(|spec| (spec.name().to_string(), spec.clone()))
            })
            .collect::<CoreResult<HashMap<_, _>>>()?;

        Ok(Self {
            search_fields,
            filter_fields,
        })
    }

    pub fn is_filterable(&self, field: &str) -> bool {
        self.filter_fields.contains_key(field)
    }

    pub fn matches(&self, record: &Record, state: &FilterState) -> bool {
        self.matches_search(record, &state.search_text)
            && state
                .active_filters()
                .all(|(field, target)| self.matches_filter(record, field, target))
    }

    /// Records that pass `state`, in input order.
    pub fn filter<'a>(&self, records: &'a [Record], state: &FilterState) -> Vec<&'a Record> {
        records.iter().filter(|r| self.matches(r, state)).collect()
    }

    fn matches_search(&self, record: &Record, text: &str) -> bool {
        let needle = fold_case(text);
        if needle.is_empty() {
            return true;
        }
        self.search_fields.iter().any(|spec| {
            let value = spec.extract(record);
            !value.is_missing() && value.display().to_lowercase().contains(&needle)
        })
    }

    fn matches_filter(&self, record: &Record, field: &str, target: &str) -> bool {
        let Some(spec) = self.filter_fields.get(field) else {
            tracing::warn!(field, "Filter on a field that is not filterable; no record matches");
            return false;
        };
        value_matches(spec.field_type(), &spec.extract(record), target)
    }
}

/// Case folding shared by search, text filters and allowed-value checks.
pub fn fold_case(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Equality of an extracted value against a filter target.
fn value_matches(field_type: FieldType, value: &FieldValue, target: &str) -> bool {
    match (field_type, value) {
        (_, FieldValue::Missing) => false,
        (FieldType::Enum, v) => v.display() == target,
        (FieldType::Text, v) => fold_case(&v.display()) == fold_case(target),
        (FieldType::Number, FieldValue::Number(n)) => target
            .trim()
            .parse::<f64>()
            .map(|t| t == *n)
            .unwrap_or(false),
        (FieldType::Date, FieldValue::Date(ts)) => {
            let target = target.trim();
            if let Ok(day) = NaiveDate::parse_from_str(target, "%Y-%m-%d") {
                ts.date_naive() == day
            } else {
                parse_timestamp(target).map(|t| t == *ts).unwrap_or(false)
            }
        }
        (_, v) => fold_case(&v.display()) == fold_case(target),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
