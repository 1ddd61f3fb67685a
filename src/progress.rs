//! Progress reporting on stderr using indicatif.
//!
//! The run is a single streaming pass, so there is one spinner per phase
//! showing the file count and the file being examined.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receives progress updates from the finder.
pub trait ProgressCallback: Send + Sync {
    /// A phase started; `total` is 0 when unknown.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// The `current`-th item (1-based) is being processed.
    fn on_progress(&self, current: usize, path: &str);

    /// A phase finished.
    fn on_phase_end(&self, phase: &str);
}

/// Spinner-based progress reporter.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a reporter; `quiet` disables all drawing.
    ///
    /// ```
    /// use dupestash::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        bar.set_style(Self::style());
        bar.set_message(phase.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        if let Ok(slot) = self.bar.lock() {
            if let Some(ref bar) = *slot {
                bar.set_position(current as u64);
                bar.set_message(truncate_path(path, 40));
            }
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
                log::debug!("Phase {} finished after {} files", phase, bar.position());
            }
        }
    }
}

/// Shorten a path to its file name when it is too long to display.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let count = file_name.chars().count();

    if count + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(count.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_path_unchanged() {
        assert_eq!(truncate_path("/a/b.txt", 40), "/a/b.txt");
    }

    #[test]
    fn test_truncate_long_path_keeps_name() {
        let long = format!("/{}/photo.jpg", "x".repeat(80));
        assert_eq!(truncate_path(&long, 40), ".../photo.jpg");
    }

    #[test]
    fn test_truncate_long_name_multibyte() {
        let long = format!("/d/{}.txt", "é".repeat(60));
        let out = truncate_path(&long, 20);
        assert!(out.starts_with("..."));
        assert_eq!(out.chars().count(), 20);
    }

    #[test]
    fn test_quiet_progress_is_silent() {
        let progress = Progress::new(true);
        progress.on_phase_start("scan", 0);
        progress.on_progress(1, "/tmp/x");
        progress.on_phase_end("scan");
        assert!(progress.bar.lock().unwrap().is_none());
    }
}
