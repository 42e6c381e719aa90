//! CSV export encoder.
//!
//! Every cell is quoted and embedded quotes are doubled, so values holding
//! commas, quotes or newlines survive a round trip through any standard
//! parser. Encoding builds the whole document in memory: callers either get
//! a complete string or an error before anything reaches the download sink.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreResult;
use crate::field::{FieldRegistry, FieldSpec};
use crate::record::Record;

/// Separator between cells.
pub const DELIMITER: char = ',';

/// Separator between rows.
pub const LINE_TERMINATOR: &str = "\n";

/// Which records an export covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportScope {
    /// The current filtered set in current sort order.
    #[default]
    Filtered,
    /// Every record in source order, ignoring filters and sort.
    All,
}

/// Column header plus the registered field it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ExportColumn {
    #[validate(length(min = 1, max = 100))]
    pub header: String,
    #[validate(length(min = 1, max = 100))]
    pub field: String,
}

impl ExportColumn {
    pub fn new(header: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            field: field.into(),
        }
    }
}

/// Export columns resolved against a registry.
#[derive(Debug, Clone)]
pub struct CsvEncoder {
    columns: Vec<(String, FieldSpec)>,
}

impl CsvEncoder {
    pub fn new(registry: &FieldRegistry, columns: &[ExportColumn]) -> CoreResult<Self> {
        let columns = columns
            .iter()
            .map(|c| registry.get(&c.field).map(|spec| (c.header.clone(), spec.clone())))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self { columns })
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(header, _)| header.as_str())
    }

    /// Encode a header row followed by one row per record, in the order
    /// given.
    pub fn encode<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> String {
        let mut out = String::new();
        push_row(&mut out, self.headers());

        for record in records {
            out.push_str(LINE_TERMINATOR);
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|(_, spec)| spec.extract(record).display())
                .collect();
            push_row(&mut out, cells.iter().map(String::as_str));
        }

        out
    }
}

/// Quote one cell, doubling embedded quotes.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        out.push_str(&quote(cell));
    }
}

/// File name for an export of `view` taken on `date`, e.g. `orders-2024-05-01.csv`.
pub fn export_filename(view: &str, date: NaiveDate) -> String {
    let stem: String = view
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let stem = stem.trim_matches('-');
    let stem = if stem.is_empty() { "export" } else { stem };
    format!("{stem}-{}.csv", date.format("%Y-%m-%d"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
