//! Shared definitions of derived columns.
//!
//! Waiting time, wait-based priority and rating averages are computed the
//! same way for every view. Time-based fields capture `now` when they are
//! registered so repeated renders of one snapshot sort identically.

use serde_json::Value;

use crate::field::{FieldRegistry, FieldSpec, FieldType, FieldValue};
use crate::record::Record;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Priority thresholds
// ---------------------------------------------------------------------------

/// Waiting hours at or above which an item is urgent.
pub const URGENT_AFTER_HOURS: f64 = 72.0;

/// Waiting hours at or above which an item is high priority.
pub const HIGH_AFTER_HOURS: f64 = 48.0;

/// Waiting hours at or above which an item is medium priority.
pub const MEDIUM_AFTER_HOURS: f64 = 24.0;

pub const PRIORITY_URGENT: &str = "urgent";
pub const PRIORITY_HIGH: &str = "high";
pub const PRIORITY_MEDIUM: &str = "medium";
pub const PRIORITY_LOW: &str = "low";

/// Sort rank of each priority, higher is more pressing.
pub const PRIORITY_RANKS: [(&str, i64); 4] = [
    (PRIORITY_URGENT, 4),
    (PRIORITY_HIGH, 3),
    (PRIORITY_MEDIUM, 2),
    (PRIORITY_LOW, 1),
];

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Hours between `since` and `now`, never negative.
pub fn waiting_hours(since: Timestamp, now: Timestamp) -> f64 {
    let minutes = (now - since).num_minutes().max(0);
    minutes as f64 / 60.0
}

/// Priority bucket for a waiting time.
pub fn priority_for_wait(hours: f64) -> &'static str {
    if hours >= URGENT_AFTER_HOURS {
        PRIORITY_URGENT
    } else if hours >= HIGH_AFTER_HOURS {
        PRIORITY_HIGH
    } else if hours >= MEDIUM_AFTER_HOURS {
        PRIORITY_MEDIUM
    } else {
        PRIORITY_LOW
    }
}

/// Mean of `values`, `None` when empty.
pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Ratings from an array of numbers or of objects carrying a numeric
/// `rating` key (the shape review joins come back in).
fn ratings(value: Option<&Value>) -> Vec<f64> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Number(n) => n.as_f64(),
            Value::Object(map) => map.get("rating").and_then(Value::as_f64),
            _ => None,
        })
        .collect()
}

fn wait_of(record: &Record, path: &str, now: Timestamp) -> Option<f64> {
    match FieldValue::coerce(record.lookup(path), FieldType::Date) {
        FieldValue::Date(since) => Some(waiting_hours(since, now)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Register `name` as hours elapsed since the timestamp at `path`.
pub fn register_waiting_time(registry: &mut FieldRegistry, name: &str, path: &str, now: Timestamp) {
    let path = path.to_string();
    registry.register(name, FieldType::Number, move |record: &Record| {
        wait_of(record, &path, now)
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Missing)
    });
}

/// Register `name` as the wait-based priority of the timestamp at `path`,
/// ranked per [`PRIORITY_RANKS`].
pub fn register_priority(registry: &mut FieldRegistry, name: &str, path: &str, now: Timestamp) {
    let path = path.to_string();
    let spec = FieldSpec::new(name, FieldType::Enum, move |record: &Record| {
        wait_of(record, &path, now)
            .map(|hours| FieldValue::Text(priority_for_wait(hours).to_string()))
            .unwrap_or(FieldValue::Missing)
    })
    .with_rank_order(PRIORITY_RANKS);
    registry.register_spec(spec);
}

/// Register `name` as the average of the ratings at `path`.
pub fn register_average_rating(registry: &mut FieldRegistry, name: &str, path: &str) {
    let path = path.to_string();
    registry.register(name, FieldType::Number, move |record: &Record| {
        average(&ratings(record.lookup(&path)))
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Missing)
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
