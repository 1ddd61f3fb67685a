//! Detection of files already seen under another path.
//!
//! A hardlink, or a symlink followed during the walk, reaches the same
//! inode as an entry yielded earlier. Both paths share one copy of the data,
//! so treating them as duplicates would delete the only copy. The tracker
//! remembers `(device, inode)` pairs and reports repeats.
//!
//! On platforms without inode information every file is treated as new.
//!
//! ```no_run
//! use dupestash::scanner::hardlink::HardlinkTracker;
//!
//! let mut tracker = HardlinkTracker::new();
//! let meta = std::fs::metadata("a.txt").unwrap();
//! assert!(!tracker.is_hardlink(&meta));
//! assert!(tracker.is_hardlink(&meta));
//! ```

use std::collections::HashSet;
use std::fs::Metadata;

/// Set of inodes yielded so far in one run.
///
/// Not thread-safe; the walk is single-threaded and one tracker is shared
/// by every root of a run.
#[derive(Debug, Default)]
pub struct HardlinkTracker {
    seen: HashSet<InodeKey>,
}

impl HardlinkTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the inode of `metadata`, returning `true` if it was seen before.
    pub fn is_hardlink(&mut self, metadata: &Metadata) -> bool {
        match InodeKey::from_metadata(metadata) {
            Some(key) => !self.seen.insert(key),
            None => false,
        }
    }

    /// Number of distinct inodes recorded.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(not(unix), allow(dead_code))]
struct InodeKey {
    dev: u64,
    ino: u64,
}

impl InodeKey {
    #[cfg(unix)]
    fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}
