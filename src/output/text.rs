//! Plain-text summaries printed after a run.
//!
//! Per-duplicate lines are written by the executor while the run is in
//! progress; this module only formats the totals.

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::Paint;

use crate::actions::RestoreSummary;
use crate::duplicates::RunSummary;

/// Write the totals of a scan or relocate run.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn write_run_summary<W: Write>(mut w: W, summary: &RunSummary) -> io::Result<()> {
    let actions = &summary.actions;

    writeln!(w)?;
    writeln!(
        w,
        "{} {} files examined, {} duplicates ({})",
        "Summary:".bold(),
        summary.files_seen,
        summary.duplicates,
        ByteSize::b(summary.duplicate_bytes)
    )?;

    if actions.deleted > 0 {
        writeln!(
            w,
            "  deleted {} files, freed {}",
            actions.deleted,
            ByteSize::b(actions.bytes_reclaimed)
        )?;
    }
    if actions.relocated > 0 {
        writeln!(
            w,
            "  relocated {} files into {} new objects, freed {}",
            actions.relocated,
            actions.objects_stored,
            ByteSize::b(actions.bytes_reclaimed)
        )?;
    }
    if actions.failures > 0 {
        writeln!(w, "  {} {} actions failed", "!".red(), actions.failures)?;
    }
    if summary.skipped > 0 || !summary.scan_errors.is_empty() {
        writeln!(
            w,
            "  {} {} unreadable files, {} unreadable directories",
            "!".yellow(),
            summary.skipped,
            summary.scan_errors.len()
        )?;
    }
    if summary.incomplete_comparisons > 0 {
        writeln!(
            w,
            "  {} comparisons could not complete; those files were kept",
            summary.incomplete_comparisons
        )?;
    }
    if summary.dirs_pruned > 0 {
        writeln!(w, "  removed {} empty directories", summary.dirs_pruned)?;
    }
    if summary.interrupted {
        writeln!(w, "  {}", "interrupted before the scan finished".yellow())?;
    }

    writeln!(
        w,
        "  hashed {} ({} prefix, {} full digests) in {:.2?}",
        ByteSize::b(summary.bytes_hashed),
        summary.prefix_digests,
        summary.full_digests,
        summary.duration
    )
}

/// Write the outcome of a restore.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn write_restore_summary<W: Write>(mut w: W, summary: &RestoreSummary) -> io::Result<()> {
    writeln!(
        w,
        "{} restored {} files ({} already present), removed {} objects",
        "Restore:".bold(),
        summary.files_restored,
        summary.already_present,
        summary.objects_removed
    )?;
    for digest in &summary.missing_objects {
        writeln!(w, "  {} missing object {}", "!".red(), digest)?;
    }
    for (path, reason) in &summary.failures {
        writeln!(w, "  {} {}: {}", "!".red(), path, reason)?;
    }
    if summary.store_removed {
        writeln!(w, "  store removed")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(summary: &RunSummary) -> String {
        yansi::disable();
        let mut buffer = Vec::new();
        write_run_summary(&mut buffer, summary).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_report_totals() {
        let summary = RunSummary {
            files_seen: 3,
            duplicates: 1,
            duplicate_bytes: 500,
            ..Default::default()
        };
        let text = render(&summary);
        assert!(text.contains("3 files examined, 1 duplicates"));
        assert!(!text.contains("deleted"));
    }

    #[test]
    fn test_restore_lines() {
        yansi::disable();
        let summary = RestoreSummary {
            files_restored: 2,
            missing_objects: vec!["abc".to_string()],
            ..Default::default()
        };
        let mut buffer = Vec::new();
        write_restore_summary(&mut buffer, &summary).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("restored 2 files"));
        assert!(text.contains("missing object abc"));
    }
}
