use std::path::PathBuf;

use anyhow::{bail, Context};
use marketdesk_core::export::ExportScope;
use marketdesk_core::sort::{SortDirection, SortKey, SortState};

/// Page printed when `CONSOLE_PAGE` is not set.
const DEFAULT_PAGE: usize = 1;

/// CLI configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// Path to the `ViewConfig` JSON file.
    pub view_config: PathBuf,
    /// Path to the JSON array of records.
    pub records: PathBuf,
    pub search: String,
    /// `(field, value)` pairs, applied in order.
    pub filters: Vec<(String, String)>,
    /// Overrides the view's default sort when set.
    pub sort: Option<SortState>,
    pub page: usize,
    /// When set, a CSV export is written into this directory.
    pub export_dir: Option<PathBuf>,
    pub export_scope: ExportScope,
    /// Timestamp path from which `waiting_hours` and `priority` are derived.
    pub wait_field: Option<String>,
    /// Ratings array path from which `average_rating` is derived.
    pub ratings_field: Option<String>,
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                 | Default      |
    /// |-------------------------|--------------|
    /// | `CONSOLE_VIEW_CONFIG`   | required     |
    /// | `CONSOLE_RECORDS`       | required     |
    /// | `CONSOLE_SEARCH`        | empty        |
    /// | `CONSOLE_FILTERS`       | empty        |
    /// | `CONSOLE_SORT`          | view default |
    /// | `CONSOLE_PAGE`          | `1`          |
    /// | `CONSOLE_EXPORT_DIR`    | unset        |
    /// | `CONSOLE_EXPORT_SCOPE`  | `filtered`   |
    /// | `CONSOLE_WAIT_FIELD`    | unset        |
    /// | `CONSOLE_RATINGS_FIELD` | unset        |
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let optional = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let view_config = optional("CONSOLE_VIEW_CONFIG")
            .context("CONSOLE_VIEW_CONFIG environment variable is required")?;
        let records = optional("CONSOLE_RECORDS")
            .context("CONSOLE_RECORDS environment variable is required")?;

        let filters = match optional("CONSOLE_FILTERS") {
            Some(raw) => parse_filters(&raw)?,
            None => Vec::new(),
        };

        let sort = optional("CONSOLE_SORT").map(|raw| parse_sort(&raw)).transpose()?;

        let page = match optional("CONSOLE_PAGE") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|&n| n >= 1)
                .with_context(|| format!("CONSOLE_PAGE must be a positive integer, got '{raw}'"))?,
            None => DEFAULT_PAGE,
        };

        let export_scope = match optional("CONSOLE_EXPORT_SCOPE").as_deref() {
            None | Some("filtered") => ExportScope::Filtered,
            Some("all") => ExportScope::All,
            Some(other) => bail!("CONSOLE_EXPORT_SCOPE must be 'filtered' or 'all', got '{other}'"),
        };

        Ok(Self {
            view_config: PathBuf::from(view_config),
            records: PathBuf::from(records),
            search: get("CONSOLE_SEARCH").unwrap_or_default(),
            filters,
            sort,
            page,
            export_dir: optional("CONSOLE_EXPORT_DIR").map(PathBuf::from),
            export_scope,
            wait_field: optional("CONSOLE_WAIT_FIELD"),
            ratings_field: optional("CONSOLE_RATINGS_FIELD"),
        })
    }
}

/// Parse `status=pending,category=solar` into pairs.
pub fn parse_filters(raw: &str) -> anyhow::Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (field, value) = pair
                .split_once('=')
                .with_context(|| format!("Filter '{pair}' must look like field=value"))?;
            let (field, value) = (field.trim(), value.trim());
            if field.is_empty() || value.is_empty() {
                bail!("Filter '{pair}' must look like field=value");
            }
            Ok((field.to_string(), value.to_string()))
        })
        .collect()
}

/// Parse `priority:desc,waiting_hours:desc` into a sort. Direction
/// defaults to ascending.
pub fn parse_sort(raw: &str) -> anyhow::Result<SortState> {
    let keys = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|part| {
            let (field, direction) = match part.split_once(':') {
                Some((field, dir)) => (field.trim(), dir.trim()),
                None => (part, "asc"),
            };
            let direction = match direction.to_ascii_lowercase().as_str() {
                "asc" => SortDirection::Asc,
                "desc" => SortDirection::Desc,
                other => bail!("Sort direction must be 'asc' or 'desc', got '{other}'"),
            };
            Ok(SortKey {
                field: field.to_string(),
                direction,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if keys.is_empty() {
        bail!("CONSOLE_SORT must name at least one field");
    }
    Ok(SortState { keys })
}
