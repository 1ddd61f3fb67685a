//! JSON output of a run.
//!
//! ```json
//! {
//!   "duplicates": [
//!     {
//!       "duplicate": "/data/b.bin",
//!       "original": "/data/a.bin",
//!       "size": 1024,
//!       "digest": "af13...",
//!       "outcome": "reported"
//!     }
//!   ],
//!   "summary": {
//!     "roots": ["/data"],
//!     "files_seen": 100,
//!     "duplicates": 1,
//!     "duplicate_bytes": 1024,
//!     "prefix_digests": 4,
//!     "full_digests": 2,
//!     "actions": { "reported": 1, "deleted": 0, "...": 0 },
//!     "exit_code": 0,
//!     "exit_code_name": "DS000"
//!   }
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::actions::{ExecutorStats, PairRecord};
use crate::duplicates::RunSummary;
use crate::error::ExitCode;

/// Summary statistics in JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Roots scanned
    pub roots: Vec<String>,
    /// Files seen by the resolver
    pub files_seen: usize,
    /// Files below the minimum size
    pub excluded: usize,
    /// Files kept as unique
    pub unique: usize,
    /// Confirmed duplicates
    pub duplicates: usize,
    /// Bytes held by confirmed duplicates
    pub duplicate_bytes: u64,
    /// Unreadable files skipped
    pub skipped: usize,
    /// Stale candidates dropped
    pub stale_removed: usize,
    /// Comparisons that could not complete
    pub incomplete_comparisons: usize,
    /// Prefix digests computed
    pub prefix_digests: u64,
    /// Full digests computed
    pub full_digests: u64,
    /// Bytes read while hashing
    pub bytes_hashed: u64,
    /// Directories that could not be read
    pub scan_errors: Vec<String>,
    /// Empty directories removed
    pub dirs_pruned: usize,
    /// Executor totals
    pub actions: ExecutorStats,
    /// Run time in milliseconds
    pub duration_ms: u64,
    /// Whether the run was interrupted
    pub interrupted: bool,
    /// Numeric exit code
    pub exit_code: i32,
    /// Machine-readable exit code
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Build from a run summary and its exit code.
    #[must_use]
    pub fn from_run_summary(summary: &RunSummary, exit_code: ExitCode) -> Self {
        Self {
            roots: summary
                .roots
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            files_seen: summary.files_seen,
            excluded: summary.excluded,
            unique: summary.unique,
            duplicates: summary.duplicates,
            duplicate_bytes: summary.duplicate_bytes,
            skipped: summary.skipped,
            stale_removed: summary.stale_removed,
            incomplete_comparisons: summary.incomplete_comparisons,
            prefix_digests: summary.prefix_digests,
            full_digests: summary.full_digests,
            bytes_hashed: summary.bytes_hashed,
            scan_errors: summary.scan_errors.iter().map(ToString::to_string).collect(),
            dirs_pruned: summary.dirs_pruned,
            actions: summary.actions.clone(),
            duration_ms: u64::try_from(summary.duration.as_millis()).unwrap_or(u64::MAX),
            interrupted: summary.interrupted,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a> {
    /// Every disposition, in the order it happened
    pub duplicates: &'a [PairRecord],
    /// Totals
    pub summary: JsonSummary,
}

impl<'a> JsonOutput<'a> {
    /// Build the document.
    #[must_use]
    pub fn new(pairs: &'a [PairRecord], summary: &RunSummary, exit_code: ExitCode) -> Self {
        Self {
            duplicates: pairs,
            summary: JsonSummary::from_run_summary(summary, exit_code),
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty JSON plus a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_document_shape() {
        let pairs = vec![PairRecord {
            duplicate: PathBuf::from("/d/b"),
            original: PathBuf::from("/d/a"),
            size: 3,
            digest: "ff".repeat(32),
            outcome: "reported",
            error: None,
        }];
        let summary = RunSummary {
            roots: vec![PathBuf::from("/d")],
            duplicates: 1,
            duplicate_bytes: 3,
            ..Default::default()
        };

        let output = JsonOutput::new(&pairs, &summary, ExitCode::Success);
        let value: serde_json::Value = serde_json::from_str(&output.to_json_pretty().unwrap()).unwrap();

        assert_eq!(value["duplicates"][0]["original"], "/d/a");
        assert_eq!(value["duplicates"][0]["outcome"], "reported");
        assert!(value["duplicates"][0].get("error").is_none());
        assert_eq!(value["summary"]["duplicate_bytes"], 3);
        assert_eq!(value["summary"]["exit_code_name"], "DS000");
        assert_eq!(value["summary"]["actions"]["reported"], 0);
    }

    #[test]
    fn test_write_to_buffer() {
        let summary = RunSummary::default();
        let output = JsonOutput::new(&[], &summary, ExitCode::NoDuplicates);
        let mut buffer = Vec::new();
        output.write_to(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.ends_with('\n'));
        assert!(text.contains("\"exit_code\": 2"));
    }
}
