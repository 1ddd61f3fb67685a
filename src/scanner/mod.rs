//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Sorted, depth-first directory walking using walkdir
//! - Streaming BLAKE3 digests over a whole file or a bounded prefix
//! - Unicode name normalization for name-aware grouping
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal, file discovery and empty directory pruning
//! - [`hasher`]: BLAKE3 file hashing (streaming)
//! - [`path_utils`]: NFC normalization and root de-overlapping
//!
//! # Example
//!
//! ```no_run
//! use dupestash::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     skip_hidden: true,
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("."), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hardlink;
pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::path::PathBuf;
use std::time::SystemTime;

pub use hardlink::HardlinkTracker;
pub use hasher::{hash_to_hex, hex_to_hash, Hash, Hasher, DEFAULT_PREFIX_WINDOW};
pub use walker::{prune_empty_dirs, Walker};

/// A file yielded by the traversal.
///
/// Only leaf files are reported; directories never reach the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File name as reported by the directory listing
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Last modification time, when the platform reports one
    pub modified: Option<SystemTime>,
}

impl FileEntry {
    /// Create a new FileEntry, taking the name from the last path component.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `size` - File size in bytes
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            size,
            modified: None,
        }
    }

    /// Attach the modification time seen at scan time.
    #[must_use]
    pub fn with_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.modified = modified;
        self
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Glob patterns to ignore (gitignore-style).
    pub ignore_patterns: Vec<String>,

    /// Directories that are never descended into (the content store).
    pub exclude_dirs: Vec<PathBuf>,
}

/// A per-entry traversal problem. The walk continues past it.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// A directory or file could not be listed or inspected.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The entry disappeared between listing and inspection.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Anything else walkdir reports, including symlink loops.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Entry being visited
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a digest could not be computed.
///
/// [`HashError::NotFound`] is treated differently from the rest: a candidate
/// that vanished is dropped from the index, anything else only makes the
/// comparison incomplete.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file no longer exists.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// The file exists but cannot be opened.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Open or read failed for another reason.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File being hashed
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Map an I/O error to the matching variant for `path`.
    #[must_use]
    pub fn from_io(path: &std::path::Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Whether the file no longer exists.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_entry_new() {
        let entry = FileEntry::new(PathBuf::from("/test/file.txt"), 1024);

        assert_eq!(entry.path, PathBuf::from("/test/file.txt"));
        assert_eq!(entry.name, "file.txt");
        assert_eq!(entry.size, 1024);
        assert!(entry.modified.is_none());

        let stamped = entry.with_modified(Some(SystemTime::UNIX_EPOCH));
        assert_eq!(stamped.modified, Some(SystemTime::UNIX_EPOCH));
    }

    #[test]
    fn test_walker_config_default() {
        let config = WalkerConfig::default();

        assert!(!config.follow_symlinks);
        assert!(!config.skip_hidden);
        assert!(config.ignore_patterns.is_empty());
        assert!(config.exclude_dirs.is_empty());
    }

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::PermissionDenied(PathBuf::from("/test"));
        assert_eq!(err.to_string(), "Permission denied: /test");

        let err = ScanError::NotFound(PathBuf::from("/missing"));
        assert_eq!(err.to_string(), "Path not found: /missing");
    }

    #[test]
    fn test_hash_error_from_io() {
        let path = PathBuf::from("/gone");
        let err = HashError::from_io(
            &path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "File not found: /gone");

        let err = HashError::from_io(
            &path,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no"),
        );
        assert!(matches!(err, HashError::PermissionDenied(_)));

        let err = HashError::from_io(&path, std::io::Error::other("disk on fire"));
        assert!(matches!(err, HashError::Io { .. }));
        assert!(!err.is_not_found());
    }
}
