//! Plain-text table rendering of the visible page.

use marketdesk_console::{ConsoleResult, ConsoleView};
use marketdesk_core::error::CoreResult;
use marketdesk_core::field::FieldSpec;

const COLUMN_GAP: &str = "  ";

/// Render the visible page as an aligned table with a footer line.
///
/// Columns follow the view's export columns, or every registered field
/// when none are configured. Enum cells with a palette entry are prefixed
/// with the badge icon (or tone).
pub fn render_page(view: &ConsoleView) -> ConsoleResult<String> {
    let page = view.visible_page()?;
    let config = view.config();
    let registry = view.registry();

    let columns: Vec<(String, &FieldSpec)> = if config.export_columns.is_empty() {
        registry
            .names()
            .into_iter()
            .map(|name| registry.get(name).map(|spec| (name.to_string(), spec)))
            .collect::<CoreResult<_>>()?
    } else {
        config
            .export_columns
            .iter()
            .map(|c| registry.get(&c.field).map(|spec| (c.header.clone(), spec)))
            .collect::<CoreResult<_>>()?
    };

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(page.records.len() + 1);
    let mut header = vec![" ".to_string()];
    header.extend(columns.iter().map(|(name, _)| name.clone()));
    rows.push(header);

    for record in &page.records {
        let marker = if view.is_selected(&record.id) { "*" } else { " " };
        let mut row = vec![marker.to_string()];
        for (_, spec) in &columns {
            let value = spec.extract(record).display();
            let cell = match config.palette_for(spec.name()) {
                Some(palette) if !value.is_empty() => {
                    let badge = palette.badge_for(&value);
                    let mark = badge.icon.as_deref().unwrap_or(badge.tone.as_str());
                    format!("[{mark}] {value}")
                }
                _ => value,
            };
            row.push(cell);
        }
        rows.push(row);
    }

    let widths: Vec<usize> = (0..=columns.len())
        .map(|i| rows.iter().map(|r| r[i].chars().count()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for row in &rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(line.join(COLUMN_GAP).trim_end());
        out.push('\n');
    }

    if page.total_items == 0 {
        out.push_str("No records match the current filters\n");
    } else {
        out.push_str(&format!(
            "Page {} of {} ({} records)\n",
            page.current_page, page.total_pages, page.total_items
        ));
    }
    Ok(out)
}
