//! Per-view configuration.
//!
//! A [`ViewConfig`] is plain JSON, deserialized with serde and checked in two
//! passes: shape validation through the `validator` derive, then
//! resolution of every referenced field against a [`FieldRegistry`] so an
//! unknown column fails at construction instead of at render time.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::bulk::BulkActionSpec;
use crate::error::{CoreError, CoreResult};
use crate::export::ExportColumn;
use crate::field::{FieldRegistry, FieldSpec, FieldType};
use crate::pager::DEFAULT_PAGE_SIZE;
use crate::palette::Palette;
use crate::predicate::{fold_case, FilterValue};
use crate::sort::{SortKey, SortState};

// ---------------------------------------------------------------------------
// Field declarations
// ---------------------------------------------------------------------------

/// A stored column declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FieldDef {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Dotted JSON path; defaults to `name`.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Enum values from lowest to highest rank.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rank_order: Vec<String>,
}

impl FieldDef {
    pub fn to_spec(&self) -> FieldSpec {
        let path = self.path.clone().unwrap_or_else(|| self.name.clone());
        let spec = FieldSpec::from_path(self.name.clone(), path, self.field_type);
        if self.rank_order.is_empty() {
            spec
        } else {
            spec.with_rank_order(
                self.rank_order
                    .iter()
                    .enumerate()
                    .map(|(i, value)| (value.as_str(), i as i64 + 1)),
            )
        }
    }
}

/// A discrete filter a view exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FilterableField {
    #[validate(length(min = 1, max = 100))]
    pub field: String,
    /// Values offered by the filter control. Empty means unrestricted.
    #[serde(default)]
    pub allowed_values: Vec<String>,
}

// ---------------------------------------------------------------------------
// ViewConfig
// ---------------------------------------------------------------------------

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Everything a console view needs besides its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ViewConfig {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(nested)]
    pub fields: Vec<FieldDef>,
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 500))]
    pub page_size: usize,
    #[serde(default)]
    pub searchable_fields: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub filterable_fields: Vec<FilterableField>,
    #[serde(default)]
    pub default_sort: Vec<SortKey>,
    #[serde(default)]
    #[validate(nested)]
    pub bulk_actions: Vec<BulkActionSpec>,
    #[serde(default)]
    #[validate(nested)]
    pub export_columns: Vec<ExportColumn>,
    /// Badge palettes for enum columns, keyed by field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub palettes: BTreeMap<String, Palette>,
}

impl ViewConfig {
    /// Minimal config with defaults, for building views in code.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            searchable_fields: Vec::new(),
            filterable_fields: Vec::new(),
            default_sort: Vec::new(),
            bulk_actions: Vec::new(),
            export_columns: Vec::new(),
            palettes: BTreeMap::new(),
        }
    }

    /// Parse and shape-check a JSON config.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CoreError::Validation(format!("Invalid view config: {e}")))?;
        config.check()?;
        Ok(config)
    }

    /// Shape validation that needs no registry.
    pub fn check(&self) -> CoreResult<()> {
        self.validate()
            .map_err(|e| CoreError::Validation(format!("Invalid view config: {e}")))?;

        let mut seen = HashSet::new();
        for action in &self.bulk_actions {
            if !seen.insert(action.name.as_str()) {
                return Err(CoreError::Validation(format!(
                    "Duplicate bulk action '{}'",
                    action.name
                )));
            }
        }
        Ok(())
    }

    /// Registry holding every declared field.
    pub fn build_registry(&self) -> FieldRegistry {
        let mut registry = FieldRegistry::new();
        for def in &self.fields {
            registry.register_spec(def.to_spec());
        }
        registry
    }

    /// Fail with `UnknownField` if any referenced field is not registered.
    pub fn resolve(&self, registry: &FieldRegistry) -> CoreResult<()> {
        let referenced = self
            .searchable_fields
            .iter()
            .chain(self.filterable_fields.iter().map(|f| &f.field))
            .chain(self.default_sort.iter().map(|k| &k.field))
            .chain(self.export_columns.iter().map(|c| &c.field))
            .chain(self.palettes.keys());
        for name in referenced {
            registry.get(name)?;
        }
        Ok(())
    }

    pub fn default_sort_state(&self) -> SortState {
        SortState {
            keys: self.default_sort.clone(),
        }
    }

    pub fn filterable_names(&self) -> Vec<&str> {
        self.filterable_fields.iter().map(|f| f.field.as_str()).collect()
    }

    pub fn find_action(&self, name: &str) -> Option<&BulkActionSpec> {
        self.bulk_actions.iter().find(|a| a.name == name)
    }

    pub fn palette_for(&self, field: &str) -> Option<&Palette> {
        self.palettes.get(field)
    }

    /// Check that `value` is an acceptable target for the filter on `field`
    /// and return it in the configured spelling (`Pending` -> `pending`).
    pub fn canonical_filter_value(&self, field: &str, value: FilterValue) -> CoreResult<FilterValue> {
        let filter = self
            .filterable_fields
            .iter()
            .find(|f| f.field == field)
            .ok_or_else(|| CoreError::Validation(format!("Field '{field}' is not filterable")))?;

        match value {
            FilterValue::All => Ok(FilterValue::All),
            FilterValue::Equals(target) if filter.allowed_values.is_empty() => {
                Ok(FilterValue::Equals(target))
            }
            FilterValue::Equals(target) => {
                let folded = fold_case(&target);
                filter
                    .allowed_values
                    .iter()
                    .find(|allowed| fold_case(allowed) == folded)
                    .map(|allowed| FilterValue::Equals(allowed.clone()))
                    .ok_or_else(|| {
                        CoreError::Validation(format!(
                            "Invalid value '{target}' for filter '{field}'. Allowed: {}",
                            filter.allowed_values.join(", ")
                        ))
                    })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldValue;
    use crate::palette::Tone;
    use crate::record::Record;
    use crate::sort::SortDirection;
    use assert_matches::assert_matches;
    use serde_json::json;

    const ORDERS: &str = r#"{
        "name": "orders",
        "fields": [
            {"name": "status", "type": "enum"},
            {"name": "customer", "path": "customer.name", "type": "text"},
            {"name": "total", "type": "number"},
            {"name": "priority", "type": "enum", "rank_order": ["low", "medium", "high", "urgent"]}
        ],
        "page_size": 20,
        "searchable_fields": ["customer"],
        "filterable_fields": [{"field": "status", "allowed_values": ["pending", "confirmed"]}],
        "default_sort": [{"field": "total", "direction": "desc"}],
        "bulk_actions": [{"name": "confirm", "label": "Confirm", "requires_confirmation": true}],
        "export_columns": [{"header": "Customer", "field": "customer"}],
        "palettes": {"status": {"entries": {"pending": {"tone": "warning", "icon": "clock"}}}}
    }"#;

    #[test]
    fn parses_full_config() {
        let config = ViewConfig::from_json_str(ORDERS).unwrap();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.default_sort[0].direction, SortDirection::Desc);
        assert!(config.find_action("confirm").unwrap().requires_confirmation);
        assert!(config.find_action("delete").is_none());
        assert_eq!(config.filterable_names(), vec!["status"]);
    }

    #[test]
    fn page_size_defaults() {
        let config = ViewConfig::from_json_str(r#"{"name": "users"}"#).unwrap();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn zero_page_size_rejected() {
        assert_matches!(
            ViewConfig::from_json_str(r#"{"name": "users", "page_size": 0}"#),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn empty_name_rejected() {
        assert_matches!(
            ViewConfig::from_json_str(r#"{"name": ""}"#),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn nested_column_validation_runs() {
        let json = r#"{"name": "x", "export_columns": [{"header": "", "field": "a"}]}"#;
        assert_matches!(ViewConfig::from_json_str(json), Err(CoreError::Validation(_)));
    }

    #[test]
    fn duplicate_action_names_rejected() {
        let json = r#"{"name": "x", "bulk_actions": [{"name": "approve"}, {"name": "approve"}]}"#;
        assert_matches!(
            ViewConfig::from_json_str(json),
            Err(CoreError::Validation(msg)) if msg.contains("Duplicate")
        );
    }

    #[test]
    fn malformed_json_is_validation_error() {
        assert_matches!(ViewConfig::from_json_str("{"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn registry_from_declared_fields() {
        let config = ViewConfig::from_json_str(ORDERS).unwrap();
        let registry = config.build_registry();
        assert!(config.resolve(&registry).is_ok());

        let record = Record::from_json(json!({"id": 1, "customer": {"name": "Ada"}}), 0).unwrap();
        assert_eq!(
            registry.get("customer").unwrap().extract(&record),
            FieldValue::Text("Ada".into())
        );
        assert_eq!(registry.get("priority").unwrap().rank_of("urgent"), Some(4));
        assert_eq!(registry.get("priority").unwrap().rank_of("low"), Some(1));
    }

    #[test]
    fn palettes_are_keyed_by_field() {
        let config = ViewConfig::from_json_str(ORDERS).unwrap();
        let palette = config.palette_for("status").unwrap();
        assert_eq!(palette.badge_for("Pending").tone, Tone::Warning);
        assert_eq!(palette.badge_for("confirmed").tone, Tone::Neutral);
        assert!(config.palette_for("customer").is_none());
    }

    #[test]
    fn palette_for_unknown_field_fails_resolution() {
        let mut config = ViewConfig::from_json_str(ORDERS).unwrap();
        config.palettes.insert("colour".into(), Palette::new());
        assert_matches!(
            config.resolve(&config.build_registry()),
            Err(CoreError::UnknownField(name)) if name == "colour"
        );
    }

    #[test]
    fn resolve_reports_unknown_field() {
        let mut config = ViewConfig::from_json_str(ORDERS).unwrap();
        config.export_columns.push(ExportColumn::new("SKU", "sku"));
        assert_matches!(
            config.resolve(&config.build_registry()),
            Err(CoreError::UnknownField(name)) if name == "sku"
        );
    }

    #[test]
    fn filter_values_checked_against_allowed_set() {
        let config = ViewConfig::from_json_str(ORDERS).unwrap();
        assert_eq!(
            config.canonical_filter_value("status", FilterValue::All).unwrap(),
            FilterValue::All
        );
        assert_eq!(
            config.canonical_filter_value("status", "Pending".into()).unwrap(),
            FilterValue::Equals("pending".into())
        );
        assert_matches!(
            config.canonical_filter_value("status", "shipped".into()),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            config.canonical_filter_value("customer", "Ada".into()),
            Err(CoreError::Validation(msg)) if msg.contains("not filterable")
        );
    }

    #[test]
    fn allowed_values_fold_non_ascii_case() {
        let config = ViewConfig::from_json_str(
            r#"{
                "name": "Sellers",
                "fields": [
                    {"name": "id", "type": "number"},
                    {"name": "sector", "type": "text"}
                ],
                "filterable_fields": [{"field": "sector", "allowed_values": ["Énergie", "Textile"]}]
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.canonical_filter_value("sector", "énergie".into()).unwrap(),
            FilterValue::Equals("Énergie".into())
        );
        assert_eq!(
            config.canonical_filter_value("sector", " ÉNERGIE ".into()).unwrap(),
            FilterValue::Equals("Énergie".into())
        );
    }
}
