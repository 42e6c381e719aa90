//! Command-line front end for marketplace console views.
//!
//! Loads a view configuration and a JSON record file, applies the search,
//! filters, sort and page given in the environment, prints the page and
//! optionally writes a CSV export.

pub mod config;
pub mod render;
pub mod run;

pub use config::CliConfig;
pub use run::{run, Report};
