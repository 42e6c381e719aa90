//! End-to-end behavior of `ConsoleView` over the in-memory product fixture.

mod common;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use marketdesk_console::{
    ConsoleError, ConsoleView, DataSource, RefreshOutcome, SourceError, ViewState,
};
use marketdesk_core::bulk::BulkOutcome;
use marketdesk_core::error::CoreError;
use marketdesk_core::export::{ExportColumn, ExportScope};
use marketdesk_core::record::Record;
use marketdesk_core::sort::{SortKey, SortState};
use marketdesk_core::types::RecordId;
use serde_json::json;

use common::*;

/// Source whose fetch never completes.
struct HangingSource;

#[async_trait]
impl DataSource for HangingSource {
    async fn fetch_all(&self) -> Result<Vec<Record>, SourceError> {
        std::future::pending().await
    }

    async fn apply_action(
        &self,
        action: &str,
        _ids: &BTreeSet<RecordId>,
    ) -> Result<HashMap<RecordId, BulkOutcome>, SourceError> {
        Err(SourceError::UnsupportedAction(action.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Construction and state machine
// ---------------------------------------------------------------------------

#[test]
fn unknown_export_field_fails_construction() {
    let mut config = products_config();
    config.export_columns.push(ExportColumn::new("SKU", "sku"));
    let registry = products_registry(&config);

    let result = ConsoleView::new(config, registry, products_source());
    assert_matches!(result, Err(ConsoleError::Core(CoreError::UnknownField(name))) if name == "sku");
}

#[test]
fn derived_sort_field_must_be_registered() {
    let config = products_config();
    // build_registry alone lacks the derived priority/waiting_hours fields.
    assert_matches!(
        ConsoleView::from_config(config, products_source()),
        Err(ConsoleError::Core(CoreError::UnknownField(_)))
    );
}

#[test]
fn operations_require_ready() {
    let mut view = products_view(products_source());
    assert_eq!(view.state(), &ViewState::Idle);

    assert_matches!(view.set_search("ada"), Err(ConsoleError::NotReady { state: "idle" }));
    assert_matches!(view.visible_page(), Err(ConsoleError::NotReady { .. }));
    assert_matches!(view.export_csv(ExportScope::All), Err(ConsoleError::NotReady { .. }));
}

#[tokio::test]
async fn first_refresh_enters_ready() {
    let source = products_source();
    let mut view = products_view(source);

    assert_eq!(view.refresh().await.unwrap(), RefreshOutcome::Applied { records: 5 });
    assert_eq!(view.state(), &ViewState::Ready);

    let page = view.visible_page().unwrap();
    assert_eq!(page.total_items, 5);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_next());
    assert_eq!(page_ids(&view), vec![2, 5]);
}

#[tokio::test]
async fn fetch_failure_enters_error_and_retry_recovers() {
    let source = products_source();
    source.fail_fetches(Some("connection reset")).await;
    let mut view = products_view(source.clone());

    assert_matches!(view.refresh().await, Err(ConsoleError::Fetch(msg)) if msg.contains("connection reset"));
    assert_matches!(view.state(), ViewState::Error(_));
    assert_matches!(view.set_search("x"), Err(ConsoleError::NotReady { state: "error" }));

    source.fail_fetches(None).await;
    view.refresh().await.unwrap();
    assert_eq!(view.state(), &ViewState::Ready);
    assert_eq!(view.record_count(), 5);
}

#[tokio::test]
async fn snapshot_with_repeated_id_enters_error() {
    let (source, mut view) = ready_view().await;
    source
        .insert(Record::from_json(json!({"id": 3, "name": "Shadow copy", "status": "pending"}), 5).unwrap())
        .await;

    assert_matches!(
        view.refresh().await,
        Err(ConsoleError::Core(CoreError::DuplicateId(RecordId::Int(3))))
    );
    assert_matches!(view.state(), ViewState::Error(msg) if msg.contains('3'));
    assert_matches!(view.visible_page(), Err(ConsoleError::NotReady { state: "error" }));

    source.remove(&RecordId::Int(3)).await;
    view.refresh().await.unwrap();
    assert_eq!(view.record_count(), 4);
    assert_eq!(filtered_ids(&view), vec![2, 5, 1, 4]);
}

// ---------------------------------------------------------------------------
// Refresh ordering and cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn superseded_refresh_is_discarded() {
    let (source, mut view) = ready_view().await;

    let first = view.begin_refresh().unwrap();
    let second = view.begin_refresh().unwrap();
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
    assert_eq!(view.state(), &ViewState::Loading);

    assert_eq!(
        view.finish_refresh(first, Ok(Vec::new())).unwrap(),
        RefreshOutcome::Discarded
    );
    assert_eq!(view.record_count(), 5);

    let records = source.fetch_all().await.unwrap();
    assert_eq!(
        view.finish_refresh(second, Ok(records)).unwrap(),
        RefreshOutcome::Applied { records: 5 }
    );
    assert_eq!(view.state(), &ViewState::Ready);
}

#[tokio::test]
async fn result_after_teardown_is_not_applied() {
    let source = products_source();
    let mut view = products_view(source.clone());

    let ticket = view.begin_refresh().unwrap();
    let records = source.fetch_all().await.unwrap();
    view.teardown();

    assert_eq!(view.finish_refresh(ticket, Ok(records)).unwrap(), RefreshOutcome::Discarded);
    assert_eq!(view.record_count(), 0);
    assert_matches!(view.begin_refresh(), Err(ConsoleError::Cancelled));
}

#[tokio::test]
async fn teardown_cancels_fetch_in_flight() {
    let config = products_config();
    let registry = products_registry(&config);
    let mut view = ConsoleView::new(config, registry, Arc::new(HangingSource)).unwrap();

    let token = view.cancellation_token();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        token.cancel();
    });

    assert_eq!(view.refresh().await.unwrap(), RefreshOutcome::Discarded);
    assert!(view.is_torn_down());
    assert_eq!(view.record_count(), 0);
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_filter_keeps_sort_order() {
    let (_, mut view) = ready_view().await;

    view.set_filter("status", "pending").unwrap();
    assert_eq!(filtered_ids(&view), vec![2, 5, 1]);

    view.set_filter("status", "all").unwrap();
    assert_eq!(view.filtered_count(), 5);
}

#[tokio::test]
async fn filter_value_outside_allowed_set_rejected() {
    let (_, mut view) = ready_view().await;

    assert_matches!(
        view.set_filter("status", "shipped"),
        Err(ConsoleError::Core(CoreError::Validation(_)))
    );
    assert_matches!(
        view.set_filter("seller", "Ada"),
        Err(ConsoleError::Core(CoreError::Validation(_)))
    );
    assert_eq!(view.filtered_count(), 5);
}

#[tokio::test]
async fn adding_a_filter_never_grows_the_result() {
    let (_, mut view) = ready_view().await;

    view.set_search("ADA").unwrap();
    assert_eq!(filtered_ids(&view), vec![3, 1]);

    view.set_filter("status", "Pending").unwrap();
    assert_eq!(filtered_ids(&view), vec![1]);

    view.clear_filters().unwrap();
    assert_eq!(view.filtered_count(), 5);
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn header_click_toggles_direction() {
    let (_, mut view) = ready_view().await;

    view.toggle_sort("price").unwrap();
    assert_eq!(filtered_ids(&view), vec![4, 5, 2, 1, 3]);

    view.toggle_sort("price").unwrap();
    assert_eq!(filtered_ids(&view), vec![3, 1, 2, 5, 4]);
}

#[tokio::test]
async fn unknown_sort_field_keeps_current_sort() {
    let (_, mut view) = ready_view().await;
    let before = view.sort_state().clone();

    assert_matches!(
        view.set_sort(SortState::by(SortKey::asc("sku"))),
        Err(ConsoleError::Core(CoreError::UnknownField(_)))
    );
    assert_eq!(view.sort_state(), &before);
    assert_eq!(filtered_ids(&view), vec![2, 5, 3, 1, 4]);
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

#[tokio::test]
async fn out_of_range_navigation_is_ignored() {
    let (_, mut view) = ready_view().await;

    assert!(!view.prev_page().unwrap());
    assert!(view.go_to_page(3).unwrap());
    assert_eq!(page_ids(&view), vec![4]);
    assert!(!view.next_page().unwrap());
    assert!(!view.go_to_page(9).unwrap());
    assert_eq!(view.current_page(), 3);
}

#[tokio::test]
async fn requested_page_is_clamped() {
    let (_, mut view) = ready_view().await;

    view.request_page(10).unwrap();
    let page = view.visible_page().unwrap();
    assert_eq!(page.current_page, 3);
    assert_eq!(page.records.len(), 1);
}

#[tokio::test]
async fn page_clamps_when_records_leave_the_source() {
    let (source, mut view) = ready_view().await;
    view.go_to_page(3).unwrap();

    source.remove(&RecordId::Int(4)).await;
    view.refresh().await.unwrap();

    assert_eq!(view.current_page(), 2);
    assert_eq!(page_ids(&view), vec![3, 1]);
}

#[tokio::test]
async fn narrowing_filters_returns_to_first_page() {
    let (_, mut view) = ready_view().await;
    view.go_to_page(3).unwrap();

    view.set_filter("status", "pending").unwrap();
    assert_eq!(view.current_page(), 1);
    assert_eq!(page_ids(&view), vec![2, 5]);
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn selection_survives_sort_and_filter() {
    let (_, mut view) = ready_view().await;
    view.toggle_selection(RecordId::Int(1)).unwrap();
    view.toggle_selection(RecordId::Int(3)).unwrap();

    view.toggle_sort("price").unwrap();
    view.set_filter("status", "pending").unwrap();
    view.go_to_page(2).unwrap();

    assert!(view.is_selected(&RecordId::Int(3)));
    assert_eq!(view.selected_ids().unwrap(), ids(&[1, 3]));
}

#[tokio::test]
async fn removed_record_is_pruned_from_selection() {
    let (source, mut view) = ready_view().await;
    view.toggle_selection(RecordId::Int(1)).unwrap();
    view.toggle_selection(RecordId::Int(3)).unwrap();

    source.remove(&RecordId::Int(3)).await;
    view.refresh().await.unwrap();

    assert!(view.is_selected(&RecordId::Int(1)));
    assert!(!view.is_selected(&RecordId::Int(3)));
    assert_eq!(view.selected_ids().unwrap(), ids(&[1]));
}

#[tokio::test]
async fn page_checkbox_toggles_visible_page_only() {
    let (_, mut view) = ready_view().await;

    assert!(view.toggle_page_selection().unwrap());
    assert_eq!(view.selected_ids().unwrap(), ids(&[2, 5]));

    assert!(!view.toggle_page_selection().unwrap());
    assert!(view.selected_ids().unwrap().is_empty());

    view.next_page().unwrap();
    view.select_page().unwrap();
    assert_eq!(view.selected_ids().unwrap(), ids(&[1, 3]));
}

#[tokio::test]
async fn select_all_filtered_spans_pages() {
    let (_, mut view) = ready_view().await;
    view.set_filter("status", "pending").unwrap();

    view.select_all_filtered().unwrap();
    assert_eq!(view.selected_ids().unwrap(), ids(&[1, 2, 5]));

    view.clear_selection().unwrap();
    assert!(view.selected_ids().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

fn parse_csv(content: &str) -> Vec<Vec<String>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(content.as_bytes())
        .records()
        .map(|row| row.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[tokio::test]
async fn filtered_export_follows_view_order() {
    let (_, mut view) = ready_view().await;
    view.set_filter("status", "pending").unwrap();

    let export = view.export_csv(ExportScope::Filtered).unwrap();
    assert_eq!(export.row_count, 3);
    assert!(export.filename.starts_with("pending-products-"));
    assert!(export.filename.ends_with(".csv"));

    let rows = parse_csv(&export.content);
    assert_eq!(rows[0], vec!["Id", "Product", "Status", "Price"]);
    let order: Vec<&str> = rows[1..].iter().map(|r| r[0].as_str()).collect();
    assert_eq!(order, vec!["2", "5", "1"]);
}

#[tokio::test]
async fn full_export_ignores_filters_and_keeps_awkward_values() {
    let (_, mut view) = ready_view().await;
    view.set_filter("status", "approved").unwrap();

    let export = view.export_csv(ExportScope::All).unwrap();
    assert_eq!(export.row_count, 5);

    let rows = parse_csv(&export.content);
    let order: Vec<&str> = rows[1..].iter().map(|r| r[0].as_str()).collect();
    assert_eq!(order, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(rows[4][1], "Cable 12\" rail, black");
}
