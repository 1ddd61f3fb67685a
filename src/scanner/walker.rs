//! Directory walker built on walkdir.
//!
//! # Overview
//!
//! [`Walker`] produces the stream of leaf files the duplicate resolver
//! consumes. Entries are yielded depth-first with directory children sorted
//! by file name, so two runs over the same tree see files in the same order.
//! That order decides which copy of a duplicate survives.
//!
//! # Features
//!
//! - Sorted, deterministic traversal
//! - Optional symlink following (walkdir detects loops)
//! - Gitignore-style pattern matching via the `ignore` crate
//! - Hidden file filtering
//! - Hardlinks and followed symlinks yield their inode only once
//! - Excluded directories (the stash store is never scanned)
//! - Graceful shutdown via atomic flag
//!
//! [`prune_empty_dirs`] removes directories emptied by a delete or relocate run.

use std::borrow::BorrowMut;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use walkdir::{DirEntry, WalkDir};

use super::hardlink::HardlinkTracker;
use super::{FileEntry, ScanError, WalkerConfig};

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build gitignore matcher from config patterns and .gitignore file.
    fn build_gitignore(&self) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(&self.root);

        let gitignore_path = self.root.join(".gitignore");
        if gitignore_path.exists() {
            if let Some(e) = builder.add(&gitignore_path) {
                log::warn!(
                    "Failed to load .gitignore from {}: {}",
                    gitignore_path.display(),
                    e
                );
            } else {
                log::debug!("Loaded .gitignore from {}", gitignore_path.display());
            }
        }

        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    fn should_ignore(&self, path: &Path, is_dir: bool, gitignore: Option<&Gitignore>) -> bool {
        let Some(gi) = gitignore else {
            return false;
        };
        let relative_path = path.strip_prefix(&self.root).unwrap_or(path);
        gi.matched(relative_path, is_dir).is_ignore()
    }

    /// Decide whether walkdir should descend into / yield an entry.
    fn keep_entry(&self, entry: &DirEntry, gitignore: Option<&Gitignore>) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        let path = entry.path();
        let is_dir = entry.file_type().is_dir();

        if self.config.skip_hidden && entry.file_name().to_string_lossy().starts_with('.') {
            log::trace!("Skipping hidden: {}", path.display());
            return false;
        }
        if is_dir && self.config.exclude_dirs.iter().any(|d| path == d) {
            log::debug!("Skipping excluded directory: {}", path.display());
            return false;
        }
        if self.should_ignore(path, is_dir, gitignore) {
            log::trace!("Ignoring: {}", path.display());
            return false;
        }
        true
    }

    /// Walk the directory tree, yielding file entries.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dupestash::scanner::{Walker, WalkerConfig};
    /// use std::path::Path;
    ///
    /// let walker = Walker::new(Path::new("."), WalkerConfig::default());
    /// let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
    /// println!("Found {} files", files.len());
    /// ```
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        self.entries(HardlinkTracker::new())
    }

    /// Walk like [`walk`](Self::walk), sharing `tracker` with other walks.
    ///
    /// A run over several roots passes the same tracker to each walker so
    /// a file reachable from two roots is yielded once.
    pub fn walk_with_tracker<'a>(
        &'a self,
        tracker: &'a mut HardlinkTracker,
    ) -> impl Iterator<Item = Result<FileEntry, ScanError>> + 'a {
        self.entries(tracker)
    }

    fn entries<'a>(
        &'a self,
        mut tracker: impl BorrowMut<HardlinkTracker> + 'a,
    ) -> impl Iterator<Item = Result<FileEntry, ScanError>> + 'a {
        let gitignore = self.build_gitignore();

        WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| self.keep_entry(entry, gitignore.as_ref()))
            .take_while(move |_| {
                let stop = self.is_shutdown_requested();
                if stop {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                }
                !stop
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => self.process_entry(&entry, tracker.borrow_mut()),
                Err(e) => Some(Err(self.convert_error(e))),
            })
    }

    fn process_entry(
        &self,
        entry: &DirEntry,
        tracker: &mut HardlinkTracker,
    ) -> Option<Result<FileEntry, ScanError>> {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            return None;
        }
        if file_type.is_symlink() && !self.config.follow_symlinks {
            log::trace!("Skipping symlink: {}", entry.path().display());
            return None;
        }

        // Follows the link when symlinks are followed
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => return Some(Err(self.convert_error(e))),
        };
        if !metadata.is_file() {
            return None;
        }
        if tracker.is_hardlink(&metadata) {
            log::debug!("Skipping hardlink: {}", entry.path().display());
            return None;
        }

        Some(Ok(FileEntry {
            path: entry.path().to_path_buf(),
            name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }))
    }

    fn convert_error(&self, error: walkdir::Error) -> ScanError {
        use std::io::ErrorKind;

        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        match error.io_error().map(std::io::Error::kind) {
            Some(ErrorKind::PermissionDenied) => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path)
            }
            Some(ErrorKind::NotFound) => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                ScanError::NotFound(path)
            }
            _ => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                let source = error
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
                ScanError::Io { path, source }
            }
        }
    }
}

/// Remove every empty directory below `root`, deepest first.
///
/// `root` itself and anything under `exclude` are left alone. A directory
/// that only contained empty directories is removed as well. Returns the
/// number of directories removed.
pub fn prune_empty_dirs(root: &Path, exclude: &[PathBuf]) -> usize {
    let mut removed = 0;

    let dirs = WalkDir::new(root)
        .contents_first(true)
        .into_iter()
        .filter_entry(|e| !exclude.iter().any(|x| e.path() == x))
        .filter_map(Result::ok)
        .filter(|e| e.depth() > 0 && e.file_type().is_dir());

    for dir in dirs {
        let path = dir.path();
        let is_empty = std::fs::read_dir(path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty {
            continue;
        }
        match std::fs::remove_dir(path) {
            Ok(()) => {
                log::info!("Removed empty directory: {}", path.display());
                removed += 1;
            }
            Err(e) => log::debug!("Could not remove {}: {}", path.display(), e),
        }
    }

    removed
}
