//! Console view: one table (orders, products, users...) over a snapshot.
//!
//! A view owns its filter, sort, page and selection state and an immutable
//! snapshot of records. Only a refresh replaces the snapshot, and it does
//! so all at once. State machine:
//!
//! ```text
//! Idle -> Loading -> Ready <-> Loading (refresh) -> Ready
//!            |                     |
//!            +-------> Error <-----+     (Error -> Loading on retry)
//! ```
//!
//! Filtering, sorting, paging, selection, export and bulk dispatch require
//! `Ready`. Overlapping refreshes are resolved by cancel-and-restart: each
//! [`RefreshTicket`] carries a generation and only the newest one may apply
//! its result. After [`ConsoleView::teardown`] nothing is applied.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use marketdesk_core::bulk::BulkResult;
use marketdesk_core::config::ViewConfig;
use marketdesk_core::error::CoreError;
use marketdesk_core::export::{export_filename, CsvEncoder, ExportScope};
use marketdesk_core::field::FieldRegistry;
use marketdesk_core::pager::{paginate, PageState};
use marketdesk_core::predicate::{FilterState, FilterValue, PredicateEngine};
use marketdesk_core::record::Record;
use marketdesk_core::selection::SelectionTracker;
use marketdesk_core::sort::{SortEngine, SortState};
use marketdesk_core::types::RecordId;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::confirm::Confirmer;
use crate::dispatcher::{BulkDispatcher, DispatchOutcome};
use crate::error::{ConsoleError, ConsoleResult};
use crate::source::DataSource;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ViewState {
    Idle,
    Loading,
    Ready,
    Error(String),
}

impl ViewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewState::Idle => "idle",
            ViewState::Loading => "loading",
            ViewState::Ready => "ready",
            ViewState::Error(_) => "error",
        }
    }
}

/// Handle for one in-flight refresh.
#[derive(Debug)]
pub struct RefreshTicket {
    generation: u64,
    cancel: CancellationToken,
}

impl RefreshTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once a newer refresh started or the view was torn down.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fetch from `source`, giving up as soon as this ticket is cancelled.
    pub async fn fetch(&self, source: &dyn DataSource) -> ConsoleResult<Vec<Record>> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ConsoleError::Cancelled),
            result = source.fetch_all() => result.map_err(ConsoleError::from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The snapshot was replaced.
    Applied { records: usize },
    /// The result arrived for a superseded ticket or after teardown.
    Discarded,
}

/// One rendered page of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView<'a> {
    pub records: Vec<&'a Record>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub page_size: usize,
}

impl PageView<'_> {
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }
}

/// Encoded export plus the file name to deliver it under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvExport {
    pub filename: String,
    pub content: String,
    pub row_count: usize,
}

// ---------------------------------------------------------------------------
// ConsoleView
// ---------------------------------------------------------------------------

pub struct ConsoleView {
    config: ViewConfig,
    registry: FieldRegistry,
    predicate: PredicateEngine,
    sorter: SortEngine,
    encoder: CsvEncoder,
    source: Arc<dyn DataSource>,
    dispatcher: Arc<BulkDispatcher>,

    state: ViewState,
    records: Vec<Record>,
    positions: HashMap<RecordId, usize>,
    present: HashSet<RecordId>,
    /// Indices into `records` of the filtered set, in sort order.
    ordered: Vec<usize>,

    filter: FilterState,
    sort: SortState,
    page: PageState,
    selection: SelectionTracker,

    generation: u64,
    pending: Option<CancellationToken>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ConsoleView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleView")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .field("page", &self.page)
            .field("selection", &self.selection)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl ConsoleView {
    /// Build a view. Every field the config references must be registered;
    /// otherwise construction fails with `UnknownField`.
    pub fn new(
        config: ViewConfig,
        registry: FieldRegistry,
        source: Arc<dyn DataSource>,
    ) -> ConsoleResult<Self> {
        config.check()?;
        config.resolve(&registry)?;

        let predicate =
            PredicateEngine::new(&registry, &config.searchable_fields, &config.filterable_names())?;
        let sort = config.default_sort_state();
        let sorter = SortEngine::new(&registry, &sort)?;
        let encoder = CsvEncoder::new(&registry, &config.export_columns)?;
        let page = PageState::new(config.page_size)?;

        let filter = config
            .filterable_fields
            .iter()
            .fold(FilterState::new(), |state, f| state.with_filter(f.field.clone(), FilterValue::All));

        let dispatcher = Arc::new(BulkDispatcher::new(Arc::clone(&source)));

        Ok(Self {
            config,
            registry,
            predicate,
            sorter,
            encoder,
            source,
            dispatcher,
            state: ViewState::Idle,
            records: Vec::new(),
            positions: HashMap::new(),
            present: HashSet::new(),
            ordered: Vec::new(),
            filter,
            sort,
            page,
            selection: SelectionTracker::new(),
            generation: 0,
            pending: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Build a view whose registry comes entirely from `config.fields`.
    pub fn from_config(config: ViewConfig, source: Arc<dyn DataSource>) -> ConsoleResult<Self> {
        let registry = config.build_registry();
        Self::new(config, registry, source)
    }

    /// Share a dispatcher with other views of the same source.
    pub fn with_dispatcher(mut self, dispatcher: Arc<BulkDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    // -- accessors ----------------------------------------------------------

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    /// Number of records in the snapshot.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Number of records passing the current filters.
    pub fn filtered_count(&self) -> usize {
        self.ordered.len()
    }

    /// The filtered set in sort order.
    pub fn filtered_records(&self) -> impl Iterator<Item = &Record> {
        self.ordered.iter().map(|&i| &self.records[i])
    }

    pub fn current_page(&self) -> usize {
        self.page.current_page(self.ordered.len())
    }

    /// Cancelling this token tears the view down, e.g. from the task that
    /// owns the screen while a refresh is awaited elsewhere.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn ensure_ready(&self) -> ConsoleResult<()> {
        match self.state {
            ViewState::Ready => Ok(()),
            ref other => Err(ConsoleError::NotReady {
                state: other.as_str(),
            }),
        }
    }

    // -- refresh ------------------------------------------------------------

    /// Fetch a fresh snapshot from the source and apply it.
    pub async fn refresh(&mut self) -> ConsoleResult<RefreshOutcome> {
        let ticket = self.begin_refresh()?;
        let source = Arc::clone(&self.source);
        let result = ticket.fetch(source.as_ref()).await;
        self.finish_refresh(ticket, result)
    }

    /// Enter `Loading` and hand out a ticket for the fetch. Any refresh
    /// still outstanding is cancelled.
    pub fn begin_refresh(&mut self) -> ConsoleResult<RefreshTicket> {
        if self.is_torn_down() {
            return Err(ConsoleError::Cancelled);
        }
        if let Some(previous) = self.pending.take() {
            tracing::debug!(view = %self.config.name, generation = self.generation, "Superseding refresh");
            previous.cancel();
        }

        self.generation += 1;
        let cancel = self.cancel.child_token();
        self.pending = Some(cancel.clone());
        self.state = ViewState::Loading;

        tracing::debug!(view = %self.config.name, generation = self.generation, "Refresh started");
        Ok(RefreshTicket {
            generation: self.generation,
            cancel,
        })
    }

    /// Apply the result of the fetch behind `ticket`.
    ///
    /// Results for superseded tickets, and anything arriving after
    /// teardown, are discarded without touching the view.
    pub fn finish_refresh(
        &mut self,
        ticket: RefreshTicket,
        result: ConsoleResult<Vec<Record>>,
    ) -> ConsoleResult<RefreshOutcome> {
        if self.is_torn_down() {
            tracing::debug!(view = %self.config.name, "Refresh result discarded after teardown");
            return Ok(RefreshOutcome::Discarded);
        }
        if ticket.generation != self.generation {
            tracing::debug!(
                view = %self.config.name,
                stale = ticket.generation,
                current = self.generation,
                "Stale refresh result discarded",
            );
            return Ok(RefreshOutcome::Discarded);
        }
        self.pending = None;

        let installed = result.and_then(|records| {
            let count = records.len();
            self.install(records)?;
            Ok(count)
        });

        match installed {
            Ok(count) => {
                self.state = ViewState::Ready;
                tracing::info!(
                    view = %self.config.name,
                    records = count,
                    filtered = self.ordered.len(),
                    "Refresh applied",
                );
                Ok(RefreshOutcome::Applied { records: count })
            }
            Err(e) => {
                tracing::error!(view = %self.config.name, error = %e, "Refresh failed");
                self.state = ViewState::Error(e.to_string());
                Err(e)
            }
        }
    }

    /// Cancel any refresh in flight and stop applying results.
    pub fn teardown(&mut self) {
        self.cancel.cancel();
        self.pending = None;
        tracing::debug!(view = %self.config.name, "View torn down");
    }

    /// Replace the snapshot. A snapshot with a repeated id is rejected and
    /// the previous one is kept.
    fn install(&mut self, records: Vec<Record>) -> ConsoleResult<()> {
        let mut positions = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if positions.insert(record.id.clone(), i).is_some() {
                return Err(CoreError::DuplicateId(record.id.clone()).into());
            }
        }
        self.present = positions.keys().cloned().collect();
        self.positions = positions;
        self.records = records;
        self.recompute();
        Ok(())
    }

    /// Rebuild the filtered, sorted index and clamp the page to it.
    fn recompute(&mut self) {
        let ordered = {
            let mut matched = self.predicate.filter(&self.records, &self.filter);
            self.sorter.sort(&mut matched);
            matched
                .iter()
                .filter_map(|r| self.positions.get(&r.id).copied())
                .collect()
        };
        self.ordered = ordered;
        self.page.clamp_to(self.ordered.len());
    }

    // -- filtering ----------------------------------------------------------

    /// Set the free-text search. Returns to the first page.
    pub fn set_search(&mut self, text: impl Into<String>) -> ConsoleResult<()> {
        self.ensure_ready()?;
        self.filter.search_text = text.into();
        self.page.reset();
        self.recompute();
        tracing::debug!(view = %self.config.name, search = %self.filter.search_text, matched = self.ordered.len(), "Search changed");
        Ok(())
    }

    /// Set one discrete filter. The value must be `all` or one of the
    /// field's allowed values. Returns to the first page.
    pub fn set_filter(&mut self, field: &str, value: impl Into<FilterValue>) -> ConsoleResult<()> {
        self.ensure_ready()?;
        let value = self.config.canonical_filter_value(field, value.into())?;
        tracing::debug!(view = %self.config.name, field, value = ?value, "Filter changed");
        self.filter.discrete_filters.insert(field.to_string(), value);
        self.page.reset();
        self.recompute();
        Ok(())
    }

    /// Reset search and every filter to `all`.
    pub fn clear_filters(&mut self) -> ConsoleResult<()> {
        self.ensure_ready()?;
        self.filter.search_text.clear();
        for value in self.filter.discrete_filters.values_mut() {
            *value = FilterValue::All;
        }
        self.page.reset();
        self.recompute();
        Ok(())
    }

    // -- sorting ------------------------------------------------------------

    /// Replace the sort. Unknown fields fail and leave the current sort.
    pub fn set_sort(&mut self, sort: SortState) -> ConsoleResult<()> {
        self.ensure_ready()?;
        self.sorter = SortEngine::new(&self.registry, &sort)?;
        tracing::debug!(view = %self.config.name, keys = sort.keys.len(), "Sort changed");
        self.sort = sort;
        self.recompute();
        Ok(())
    }

    /// Column-header click: flip `field` if it is the primary key,
    /// otherwise sort by it ascending.
    pub fn toggle_sort(&mut self, field: &str) -> ConsoleResult<()> {
        let next = self.sort.toggled(field);
        self.set_sort(next)
    }

    // -- paging -------------------------------------------------------------

    /// Jump to page `n`. Out-of-range pages are ignored; returns whether the
    /// page changed.
    pub fn go_to_page(&mut self, n: usize) -> ConsoleResult<bool> {
        self.ensure_ready()?;
        Ok(self.page.go_to(n, self.ordered.len()))
    }

    pub fn next_page(&mut self) -> ConsoleResult<bool> {
        self.ensure_ready()?;
        Ok(self.page.next(self.ordered.len()))
    }

    pub fn prev_page(&mut self) -> ConsoleResult<bool> {
        self.ensure_ready()?;
        Ok(self.page.prev(self.ordered.len()))
    }

    /// Request a page without range checks (e.g. from a bookmarked URL).
    /// The page shown is clamped.
    pub fn request_page(&mut self, n: usize) -> ConsoleResult<()> {
        self.ensure_ready()?;
        self.page.request_page(n);
        Ok(())
    }

    pub fn visible_page(&self) -> ConsoleResult<PageView<'_>> {
        self.ensure_ready()?;
        let page = paginate(&self.ordered, &self.page);
        Ok(PageView {
            records: page.items.iter().map(|&i| &self.records[i]).collect(),
            current_page: page.current_page,
            total_pages: page.total_pages,
            total_items: page.total_items,
            page_size: page.page_size,
        })
    }

    fn visible_ids(&self) -> Vec<RecordId> {
        paginate(&self.ordered, &self.page)
            .items
            .iter()
            .map(|&i| self.records[i].id.clone())
            .collect()
    }

    // -- selection ----------------------------------------------------------

    /// Flip one id. Returns whether it is selected afterwards.
    pub fn toggle_selection(&mut self, id: RecordId) -> ConsoleResult<bool> {
        self.ensure_ready()?;
        Ok(self.selection.toggle(id))
    }

    /// Select every record on the visible page.
    pub fn select_page(&mut self) -> ConsoleResult<()> {
        self.ensure_ready()?;
        let visible = self.visible_ids();
        self.selection.select_all(&visible);
        Ok(())
    }

    /// Page header checkbox. Returns whether the page ends selected.
    pub fn toggle_page_selection(&mut self) -> ConsoleResult<bool> {
        self.ensure_ready()?;
        let visible = self.visible_ids();
        Ok(self.selection.toggle_all(&visible))
    }

    /// Select the whole filtered set, across pages.
    pub fn select_all_filtered(&mut self) -> ConsoleResult<()> {
        self.ensure_ready()?;
        let filtered: Vec<RecordId> = self.filtered_records().map(|r| r.id.clone()).collect();
        self.selection.select_all_filtered(&filtered);
        Ok(())
    }

    pub fn clear_selection(&mut self) -> ConsoleResult<()> {
        self.ensure_ready()?;
        self.selection.clear();
        Ok(())
    }

    /// Whether `id` is selected and still present in the snapshot.
    pub fn is_selected(&self, id: &RecordId) -> bool {
        self.present.contains(id) && self.selection.is_selected(id)
    }

    /// Selected ids still present in the snapshot. Ids whose records left
    /// the source are pruned here.
    pub fn selected_ids(&mut self) -> ConsoleResult<BTreeSet<RecordId>> {
        self.ensure_ready()?;
        let before = self.selection.len();
        let selected = self.selection.selected_ids(&self.present).clone();
        if selected.len() != before {
            tracing::debug!(view = %self.config.name, pruned = before - selected.len(), "Pruned stale selection");
        }
        Ok(selected)
    }

    // -- export -------------------------------------------------------------

    /// Encode the configured export columns. `Filtered` follows the current
    /// filters and sort; `All` covers the whole snapshot in source order.
    pub fn export_csv(&self, scope: ExportScope) -> ConsoleResult<CsvExport> {
        self.ensure_ready()?;
        if self.config.export_columns.is_empty() {
            return Err(CoreError::Validation(format!(
                "View '{}' has no export columns",
                self.config.name
            ))
            .into());
        }

        let (content, row_count) = match scope {
            ExportScope::Filtered => (self.encoder.encode(self.filtered_records()), self.ordered.len()),
            ExportScope::All => (self.encoder.encode(&self.records), self.records.len()),
        };
        let filename = export_filename(&self.config.name, Utc::now().date_naive());

        tracing::info!(view = %self.config.name, scope = ?scope, rows = row_count, "CSV export encoded");
        Ok(CsvExport {
            filename,
            content,
            row_count,
        })
    }

    // -- bulk actions -------------------------------------------------------

    /// Dispatch a configured bulk action against the current selection.
    ///
    /// Succeeded ids are deselected and failed ids stay selected for retry.
    /// When anything succeeded the view refreshes; a failed refresh is
    /// logged and leaves the view in `Error`, the bulk result is still
    /// returned. If the view is torn down while the action runs the result
    /// is returned untouched.
    pub async fn dispatch(
        &mut self,
        action: Option<&str>,
        confirmer: &dyn Confirmer,
    ) -> ConsoleResult<DispatchOutcome> {
        self.ensure_ready()?;
        let spec = match action {
            Some(name) => Some(self.config.find_action(name).cloned().ok_or_else(|| {
                CoreError::Validation(format!("Unknown bulk action '{name}'"))
            })?),
            None => None,
        };
        let ids = self.selected_ids()?;

        let dispatcher = Arc::clone(&self.dispatcher);
        let outcome = dispatcher.dispatch(spec.as_ref(), &ids, confirmer).await?;

        if self.is_torn_down() {
            return Ok(outcome);
        }
        if let DispatchOutcome::Completed(result) = &outcome {
            self.apply_result(result);
            if result.succeeded_count > 0 {
                if let Err(e) = self.refresh().await {
                    tracing::warn!(view = %self.config.name, error = %e, "Refresh after bulk action failed");
                }
            }
        }
        Ok(outcome)
    }

    /// Drop succeeded ids from the selection.
    pub fn apply_result(&mut self, result: &BulkResult) {
        self.selection.deselect(&result.succeeded);
    }
}
