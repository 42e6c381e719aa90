//! Marketplace console engine.
//!
//! Pure, synchronous building blocks for the admin tables (orders, products,
//! users, commissions, reviews). Nothing here performs I/O:
//!
//! - [`FieldRegistry`] maps column names to typed extractors over [`Record`]s.
//! - [`PredicateEngine`] applies search text and discrete filters.
//! - [`SortEngine`] orders records by one or more keys with a stable id tie-break.
//! - [`paginate`] slices an ordered set into a [`Page`].
//! - [`SelectionTracker`] keeps selected ids across re-sorts and refreshes.
//! - [`bulk`] validates dispatches and aggregates per-id outcomes.
//! - [`CsvEncoder`] renders the export document.
//! - [`ViewConfig`] declares all of the above for one view.

pub mod bulk;
pub mod config;
pub mod derived;
pub mod error;
pub mod export;
pub mod field;
pub mod pager;
pub mod palette;
pub mod predicate;
pub mod record;
pub mod selection;
pub mod sort;
pub mod types;

pub use bulk::{BulkActionSpec, BulkFailure, BulkOutcome, BulkResult};
pub use config::{FieldDef, FilterableField, ViewConfig};
pub use error::{CoreError, CoreResult};
pub use export::{export_filename, CsvEncoder, ExportColumn, ExportScope};
pub use field::{FieldRegistry, FieldSpec, FieldType, FieldValue};
pub use pager::{paginate, Page, PageState};
pub use palette::{Badge, Palette, Tone};
pub use predicate::{FilterState, FilterValue, PredicateEngine};
pub use record::{records_from_json, Record};
pub use selection::SelectionTracker;
pub use sort::{SortDirection, SortEngine, SortKey, SortState};
pub use types::{RecordId, Timestamp};
