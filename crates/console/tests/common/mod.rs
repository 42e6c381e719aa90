#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use marketdesk_console::{ConsoleView, InMemorySource};
use marketdesk_core::bulk::BulkOutcome;
use marketdesk_core::config::ViewConfig;
use marketdesk_core::derived::{register_priority, register_waiting_time};
use marketdesk_core::field::FieldRegistry;
use marketdesk_core::record::Record;
use marketdesk_core::types::{RecordId, Timestamp};
use serde_json::json;

/// Fixed "now" so derived waiting times are deterministic.
pub fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
}

/// Product moderation queue: five products, page size 2, sorted by
/// priority then waiting time, both descending.
pub const PRODUCTS_CONFIG: &str = r#"{
    "name": "Pending Products",
    "fields": [
        {"name": "id", "type": "number"},
        {"name": "name", "type": "text"},
        {"name": "status", "type": "enum"},
        {"name": "seller", "path": "seller.name", "type": "text"},
        {"name": "price", "type": "number"},
        {"name": "submitted_at", "type": "date"}
    ],
    "page_size": 2,
    "searchable_fields": ["name", "seller"],
    "filterable_fields": [
        {"field": "status", "allowed_values": ["pending", "approved", "rejected"]}
    ],
    "default_sort": [
        {"field": "priority", "direction": "desc"},
        {"field": "waiting_hours", "direction": "desc"}
    ],
    "bulk_actions": [
        {"name": "approve", "label": "Approve"},
        {"name": "delete", "label": "Delete", "requires_confirmation": true}
    ],
    "export_columns": [
        {"header": "Id", "field": "id"},
        {"header": "Product", "field": "name"},
        {"header": "Status", "field": "status"},
        {"header": "Price", "field": "price"}
    ]
}"#;

/// Waiting hours at `now()`: 1 -> 24 (medium), 2 -> 96 (urgent),
/// 3 -> 60 (high), 4 -> 6 (low), 5 -> 72 (urgent).
pub fn product_records() -> Vec<Record> {
    marketdesk_core::record::records_from_json(json!([
        {"id": 1, "name": "Solar Panel", "status": "pending", "seller": {"name": "Ada"},
         "price": 250, "submitted_at": "2024-06-09T12:00:00Z"},
        {"id": 2, "name": "Battery Pack", "status": "pending", "seller": {"name": "Bo"},
         "price": 99.5, "submitted_at": "2024-06-06T12:00:00Z"},
        {"id": 3, "name": "Inverter", "status": "approved", "seller": {"name": "Ada"},
         "price": 400, "submitted_at": "2024-06-08T00:00:00Z"},
        {"id": 4, "name": "Cable 12\" rail, black", "status": "rejected", "seller": {"name": "Cy"},
         "price": 12, "submitted_at": "2024-06-10T06:00:00Z"},
        {"id": 5, "name": "Mount", "status": "pending", "seller": {"name": "Bo"},
         "price": 45, "submitted_at": "2024-06-07T12:00:00Z"}
    ]))
    .unwrap()
}

pub fn products_config() -> ViewConfig {
    ViewConfig::from_json_str(PRODUCTS_CONFIG).unwrap()
}

pub fn products_registry(config: &ViewConfig) -> FieldRegistry {
    let mut registry = config.build_registry();
    register_waiting_time(&mut registry, "waiting_hours", "submitted_at", now());
    register_priority(&mut registry, "priority", "submitted_at", now());
    registry
}

/// Approving anything that is not pending fails for that id.
pub fn products_source() -> Arc<InMemorySource> {
    Arc::new(
        InMemorySource::new(product_records())
            .with_update("approve", |record| {
                if record.fields.get("status") == Some(&json!("pending")) {
                    record.fields.insert("status".into(), json!("approved"));
                    BulkOutcome::Succeeded
                } else {
                    BulkOutcome::failed("only pending products can be approved")
                }
            })
            .with_removal("delete"),
    )
}

pub fn products_view(source: Arc<InMemorySource>) -> ConsoleView {
    let config = products_config();
    let registry = products_registry(&config);
    ConsoleView::new(config, registry, source).unwrap()
}

/// A view over the product fixture that has completed its first refresh.
pub async fn ready_view() -> (Arc<InMemorySource>, ConsoleView) {
    let source = products_source();
    let mut view = products_view(source.clone());
    view.refresh().await.unwrap();
    (source, view)
}

pub fn ids(values: &[i64]) -> BTreeSet<RecordId> {
    values.iter().copied().map(RecordId::Int).collect()
}

pub fn page_ids(view: &ConsoleView) -> Vec<i64> {
    view.visible_page()
        .unwrap()
        .records
        .iter()
        .filter_map(|r| match r.id {
            RecordId::Int(n) => Some(n),
            RecordId::Text(_) => None,
        })
        .collect()
}

pub fn filtered_ids(view: &ConsoleView) -> Vec<i64> {
    view.filtered_records()
        .filter_map(|r| match r.id {
            RecordId::Int(n) => Some(n),
            RecordId::Text(_) => None,
        })
        .collect()
}
