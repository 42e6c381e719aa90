//! `marketdesk-cli` -- print one page of a console view.
//!
//! Reads a view configuration and a JSON record file, applies search,
//! filters and sort, prints the requested page and optionally writes a CSV
//! export.
//!
//! # Environment variables
//!
//! | Variable                | Required | Default      | Description                                  |
//! |-------------------------|----------|--------------|----------------------------------------------|
//! | `CONSOLE_VIEW_CONFIG`   | yes      | --           | Path to the view configuration JSON          |
//! | `CONSOLE_RECORDS`       | yes      | --           | Path to a JSON array of records              |
//! | `CONSOLE_SEARCH`        | no       | empty        | Free-text search                             |
//! | `CONSOLE_FILTERS`       | no       | empty        | `field=value` pairs separated by `,`         |
//! | `CONSOLE_SORT`          | no       | view default | `field[:asc\|desc]` keys separated by `,`    |
//! | `CONSOLE_PAGE`          | no       | `1`          | Page to print (clamped to the last page)     |
//! | `CONSOLE_EXPORT_DIR`    | no       | --           | Write `<view>-<date>.csv` into this directory |
//! | `CONSOLE_EXPORT_SCOPE`  | no       | `filtered`   | `filtered` or `all`                          |
//! | `CONSOLE_WAIT_FIELD`    | no       | --           | Timestamp path for `waiting_hours`/`priority` |
//! | `CONSOLE_RATINGS_FIELD` | no       | --           | Ratings path for `average_rating`            |

use marketdesk_cli::{run, CliConfig};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketdesk_cli=info,marketdesk_console=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = CliConfig::from_env()?;

    tracing::info!(
        view_config = %config.view_config.display(),
        records = %config.records.display(),
        page = config.page,
        filters = config.filters.len(),
        "Starting marketdesk-cli",
    );

    let report = run(&config).await?;
    print!("{}", report.table);

    if let Some(path) = report.export_path {
        tracing::info!(path = %path.display(), "CSV export saved");
    }
    Ok(())
}
