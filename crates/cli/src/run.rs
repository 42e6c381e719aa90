use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use marketdesk_console::{ConsoleView, JsonFileSource};
use marketdesk_core::config::ViewConfig;
use marketdesk_core::derived;

use crate::config::CliConfig;
use crate::render::render_page;

/// Name of the derived waiting-time column.
pub const WAITING_FIELD: &str = "waiting_hours";
/// Name of the derived priority column.
pub const PRIORITY_FIELD: &str = "priority";
/// Name of the derived rating average column.
pub const RATING_FIELD: &str = "average_rating";

/// What one run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub table: String,
    pub export_path: Option<PathBuf>,
}

/// Load, query and render one view as described by `config`.
pub async fn run(config: &CliConfig) -> anyhow::Result<Report> {
    let raw = tokio::fs::read_to_string(&config.view_config)
        .await
        .with_context(|| format!("Failed to read view config {}", config.view_config.display()))?;
    let view_config = ViewConfig::from_json_str(&raw)?;

    let mut registry = view_config.build_registry();
    if let Some(path) = &config.wait_field {
        let now = Utc::now();
        derived::register_waiting_time(&mut registry, WAITING_FIELD, path, now);
        derived::register_priority(&mut registry, PRIORITY_FIELD, path, now);
    }
    if let Some(path) = &config.ratings_field {
        derived::register_average_rating(&mut registry, RATING_FIELD, path);
    }

    let source = Arc::new(JsonFileSource::new(&config.records));
    let mut view = ConsoleView::new(view_config, registry, source)?;

    view.refresh()
        .await
        .with_context(|| format!("Failed to load records from {}", config.records.display()))?;

    if !config.search.trim().is_empty() {
        view.set_search(config.search.as_str())?;
    }
    for (field, value) in &config.filters {
        view.set_filter(field, value.as_str())?;
    }
    if let Some(sort) = &config.sort {
        view.set_sort(sort.clone())?;
    }
    view.request_page(config.page)?;

    let table = render_page(&view)?;

    let export_path = match &config.export_dir {
        Some(dir) => {
            let export = view.export_csv(config.export_scope)?;
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
            let path = dir.join(&export.filename);
            tokio::fs::write(&path, &export.content)
                .await
                .with_context(|| format!("Failed to write export {}", path.display()))?;
            tracing::info!(path = %path.display(), rows = export.row_count, "Export written");
            Some(path)
        }
        None => None,
    };

    view.teardown();
    Ok(Report { table, export_path })
}
