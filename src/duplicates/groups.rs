//! Candidate index: files grouped by a cheap discriminator key.
//!
//! # Overview
//!
//! Every file the resolver keeps is stored as a [`FileRecord`] inside the
//! [`CandidateGroup`] for its [`GroupKey`]. The key is the file size, or the
//! normalized file name plus size when names must match too. Files with
//! equal keys are only *possibly* identical; their digests are filled in
//! lazily, the first time a comparison needs them.
//!
//! Digest fields use [`DigestState`] rather than `Option` so "not computed
//! yet" can never be mistaken for a real value.
//!
//! # Example
//!
//! ```
//! use dupestash::duplicates::{CandidateIndex, FileRecord, GroupKey};
//! use std::path::PathBuf;
//!
//! let mut index = CandidateIndex::new();
//! let key = GroupKey::for_file("a.txt", 1024, true);
//!
//! assert!(index.lookup(&key).is_none());
//! index.insert(key.clone(), FileRecord::new(PathBuf::from("/a.txt"), 1024));
//! assert_eq!(index.lookup(&key).map(|g| g.len()), Some(1));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::scanner::path_utils::normalize_name;
use crate::scanner::{hash_to_hex, FileEntry, Hash};

/// Lazily computed digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestState {
    /// Not computed yet.
    #[default]
    Unset,
    /// Computed value.
    Computed(Hash),
}

impl DigestState {
    /// The computed digest, if any.
    #[must_use]
    pub fn get(&self) -> Option<&Hash> {
        match self {
            Self::Unset => None,
            Self::Computed(hash) => Some(hash),
        }
    }

    /// Whether the digest has been computed.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }

    /// Whether this state holds exactly `hash`.
    #[must_use]
    pub fn matches(&self, hash: &Hash) -> bool {
        self.get() == Some(hash)
    }
}

impl fmt::Display for DigestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "-"),
            Self::Computed(hash) => write!(f, "{}", hash_to_hex(hash)),
        }
    }
}

/// One file known to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path of the file
    pub path: PathBuf,
    /// File size in bytes, fixed when the record is created
    pub size: u64,
    /// Digest of the first `prefix_window` bytes
    pub prefix_digest: DigestState,
    /// Digest of the whole file
    pub full_digest: DigestState,
    /// Modification time at scan, checked again before any mutation
    pub modified: Option<SystemTime>,
}

impl FileRecord {
    /// Create a record with neither digest computed.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            prefix_digest: DigestState::Unset,
            full_digest: DigestState::Unset,
            modified: None,
        }
    }

    /// Create a record for a walked file, keeping its size and mtime.
    #[must_use]
    pub fn from_entry(entry: &FileEntry) -> Self {
        Self {
            modified: entry.modified,
            ..Self::new(entry.path.clone(), entry.size)
        }
    }

    /// Set both digests from a single whole-file digest.
    ///
    /// Only valid for files no larger than the prefix window, where the
    /// prefix *is* the whole content.
    pub fn set_whole_content_digest(&mut self, hash: Hash) {
        self.prefix_digest = DigestState::Computed(hash);
        self.full_digest = DigestState::Computed(hash);
    }

    /// Hex form of the full digest, or `-` if not computed.
    #[must_use]
    pub fn full_hex(&self) -> String {
        self.full_digest.to_string()
    }
}

/// Discriminator key partitioning files before any hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// Size alone (file names ignored).
    Size(u64),
    /// NFC-normalized file name plus size.
    NameSize(String, u64),
}

impl GroupKey {
    /// Build the key for a file.
    ///
    /// # Arguments
    ///
    /// * `name` - File name (last path component)
    /// * `size` - File size in bytes
    /// * `ignore_name` - Group by size alone when true
    #[must_use]
    pub fn for_file(name: &str, size: u64, ignore_name: bool) -> Self {
        if ignore_name {
            Self::Size(size)
        } else {
            Self::NameSize(normalize_name(name).into_owned(), size)
        }
    }

    /// The size component of the key.
    #[must_use]
    pub fn size(&self) -> u64 {
        match self {
            Self::Size(size) | Self::NameSize(_, size) => *size,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size(size) => write!(f, "{size}"),
            Self::NameSize(name, size) => write!(f, "{name}_{size}"),
        }
    }
}

/// All records sharing one [`GroupKey`], in insertion order.
///
/// The first record is the first file seen under the key and is never
/// displaced by a later identical file.
#[derive(Debug, Clone, Default)]
pub struct CandidateGroup {
    records: Vec<FileRecord>,
}

impl CandidateGroup {
    /// Create a group holding a single record.
    #[must_use]
    pub fn with_record(record: FileRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    /// Records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Mutable access for digest backfill.
    pub fn records_mut(&mut self) -> &mut [FileRecord] {
        &mut self.records
    }

    /// Append a record.
    pub fn push(&mut self, record: FileRecord) {
        debug_assert!(
            self.records.first().map_or(true, |r| r.size == record.size),
            "record size {} does not match group",
            record.size
        );
        self.records.push(record);
    }

    /// Drop the records whose positions are listed in `stale`.
    ///
    /// Used when a candidate's backing file has disappeared.
    pub fn remove_stale(&mut self, stale: &[usize]) -> Vec<FileRecord> {
        let mut removed = Vec::new();
        let mut idx = 0;
        self.records.retain(|record| {
            let keep = !stale.contains(&idx);
            if !keep {
                removed.push(record.clone());
            }
            idx += 1;
            keep
        });
        removed
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the group has no records left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check the lazy-digest invariant.
    ///
    /// Among records sharing a prefix digest at most one may lack its full
    /// digest, and a full digest never exists without a prefix digest.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        if self
            .records
            .iter()
            .any(|r| r.full_digest.is_computed() && !r.prefix_digest.is_computed())
        {
            return false;
        }

        let mut unresolved: HashMap<Hash, usize> = HashMap::new();
        for record in &self.records {
            if let (Some(prefix), false) =
                (record.prefix_digest.get(), record.full_digest.is_computed())
            {
                *unresolved.entry(*prefix).or_default() += 1;
            }
        }
        unresolved.values().all(|&count| count <= 1)
    }
}

/// In-memory mapping from [`GroupKey`] to [`CandidateGroup`].
///
/// One index lives for one run; it is never shared between runs.
#[derive(Debug, Default)]
pub struct CandidateIndex {
    groups: HashMap<GroupKey, CandidateGroup>,
}

impl CandidateIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the group for `key`.
    #[must_use]
    pub fn lookup(&self, key: &GroupKey) -> Option<&CandidateGroup> {
        self.groups.get(key)
    }

    /// Find the group for `key` for mutation.
    pub fn lookup_mut(&mut self, key: &GroupKey) -> Option<&mut CandidateGroup> {
        self.groups.get_mut(key)
    }

    /// Add a record under `key`, creating the group if needed.
    pub fn insert(&mut self, key: GroupKey, record: FileRecord) {
        self.groups.entry(key).or_default().push(record);
    }

    /// Remove an empty group.
    pub fn remove_if_empty(&mut self, key: &GroupKey) {
        if self.groups.get(key).is_some_and(CandidateGroup::is_empty) {
            self.groups.remove(key);
        }
    }

    /// Iterate over all groups.
    pub fn groups(&self) -> impl Iterator<Item = (&GroupKey, &CandidateGroup)> {
        self.groups.iter()
    }

    /// Number of groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total number of records across all groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(CandidateGroup::len).sum()
    }

    /// Whether the index holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, size: u64) -> FileRecord {
        FileRecord::new(PathBuf::from(path), size)
    }

    #[test]
    fn test_digest_state_default_unset() {
        let state = DigestState::default();
        assert!(!state.is_computed());
        assert_eq!(state.get(), None);
        assert_eq!(state.to_string(), "-");
    }

    #[test]
    fn test_digest_state_zero_is_not_unset() {
        let zero = DigestState::Computed([0u8; 32]);
        assert!(zero.is_computed());
        assert!(zero.matches(&[0u8; 32]));
        assert_ne!(zero, DigestState::Unset);
    }

    #[test]
    fn test_group_key_ignores_name() {
        assert_eq!(
            GroupKey::for_file("a.txt", 10, true),
            GroupKey::for_file("b.txt", 10, true)
        );
        assert_ne!(
            GroupKey::for_file("a.txt", 10, false),
            GroupKey::for_file("b.txt", 10, false)
        );
    }

    #[test]
    fn test_group_key_normalizes_name() {
        assert_eq!(
            GroupKey::for_file("cafe\u{0301}.txt", 10, false),
            GroupKey::for_file("café.txt", 10, false)
        );
    }

    #[test]
    fn test_group_key_display() {
        assert_eq!(GroupKey::Size(42).to_string(), "42");
        assert_eq!(
            GroupKey::NameSize("a.txt".into(), 42).to_string(),
            "a.txt_42"
        );
        assert_eq!(GroupKey::NameSize("a.txt".into(), 42).size(), 42);
    }

    #[test]
    fn test_index_insert_and_lookup() {
        let mut index = CandidateIndex::new();
        let key = GroupKey::Size(100);
        index.insert(key.clone(), record("/a", 100));
        index.insert(key.clone(), record("/b", 100));
        index.insert(GroupKey::Size(200), record("/c", 200));

        assert_eq!(index.group_count(), 2);
        assert_eq!(index.len(), 3);
        let group = index.lookup(&key).unwrap();
        assert_eq!(group.records()[0].path, PathBuf::from("/a"));
        assert_eq!(group.records()[1].path, PathBuf::from("/b"));
    }

    #[test]
    fn test_remove_stale_and_empty() {
        let mut index = CandidateIndex::new();
        let key = GroupKey::Size(5);
        index.insert(key.clone(), record("/gone", 5));

        let removed = index.lookup_mut(&key).unwrap().remove_stale(&[0]);
        assert_eq!(removed.len(), 1);
        index.remove_if_empty(&key);
        assert!(index.lookup(&key).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_consistency_rules() {
        let mut group = CandidateGroup::with_record(record("/a", 10));
        assert!(group.is_consistent());

        let mut b = record("/b", 10);
        b.prefix_digest = DigestState::Computed([1; 32]);
        group.push(b);
        group.records_mut()[0].prefix_digest = DigestState::Computed([2; 32]);
        // Different prefixes, both unresolved: fine
        assert!(group.is_consistent());

        let mut c = record("/c", 10);
        c.prefix_digest = DigestState::Computed([1; 32]);
        group.push(c.clone());
        // Two unresolved records share prefix [1; 32]
        assert!(!group.is_consistent());

        let mut bad = CandidateGroup::default();
        let mut orphan = record("/d", 10);
        orphan.full_digest = DigestState::Computed([3; 32]);
        bad.push(orphan);
        assert!(!bad.is_consistent());
    }
}
