//! Async runtime for marketplace console views.
//!
//! - [`ConsoleView`] drives one table through `Idle -> Loading -> Ready`
//!   with cancellable, cancel-and-restart refreshes.
//! - [`DataSource`] is the external owner of records; [`InMemorySource`] and
//!   [`JsonFileSource`] are the bundled implementations.
//! - [`BulkDispatcher`] applies bulk actions with an in-flight guard.
//! - [`Confirmer`] asks the operator before destructive actions.

pub mod confirm;
pub mod dispatcher;
pub mod error;
pub mod source;
pub mod view;

pub use confirm::{AutoConfirm, Confirmer};
pub use dispatcher::{BulkDispatcher, DispatchOutcome};
pub use error::{ConsoleError, ConsoleResult};
pub use source::{DataSource, InMemorySource, JsonFileSource, SourceError};
pub use view::{ConsoleView, CsvExport, PageView, RefreshOutcome, RefreshTicket, ViewState};
