//! Output formatters for run results.
//!
//! - Text totals for terminals
//! - A JSON document for scripting (`--output json`)
//! - A CSV inventory of duplicate sets (`--output csv`)

pub mod csv;
pub mod json;
pub mod text;

pub use self::csv::{CsvOutput, CsvOutputError};
pub use json::{JsonOutput, JsonSummary};
pub use text::{write_restore_summary, write_run_summary};
