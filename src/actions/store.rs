//! Content-addressed store for relocated duplicates.
//!
//! # Layout
//!
//! ```text
//! <root>/.dupestash/
//!     objects/<hex digest>     one file per distinct content
//!     manifest.jsonl           {"path": "<relative path>", "digest": "<hex>"} per line
//! ```
//!
//! Manifest paths are relative to `<root>` and always use forward slashes.
//!
//! # Ordering
//!
//! An object is fully written and synced before it is renamed into place,
//! and the manifest line is synced before the caller removes the source.
//! A crash at any point leaves the bytes reachable either at the source path
//! or through the manifest.
//!
//! [`restore`] reverses a relocation: every manifest path gets its bytes
//! back and the store is removed once nothing references it.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scanner::path_utils::resolve_key;
use crate::scanner::{hash_to_hex, hex_to_hash, Hash};

/// Name of the store directory created under the relocation root.
pub const STORE_DIR_NAME: &str = ".dupestash";

const OBJECTS_DIR: &str = "objects";
const MANIFEST_FILE: &str = "manifest.jsonl";
const COPY_BUFFER: usize = 64 * 1024;

/// Errors from the content store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Filesystem error on a store path.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The bytes copied did not hash to the expected digest.
    #[error("content of {path} changed while copying (expected {expected}, got {actual})")]
    DigestMismatch {
        /// Source path
        path: PathBuf,
        /// Expected hex digest
        expected: String,
        /// Hex digest of what was copied
        actual: String,
    },

    /// A manifest line could not be parsed.
    #[error("malformed manifest line {line}: {message}")]
    Manifest {
        /// 1-based line number
        line: usize,
        /// Parser message
        message: String,
    },

    /// There is no store under the given root.
    #[error("no content store found under {0}")]
    NotFound(PathBuf),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the store root, forward slashes
    pub path: String,
    /// Hex full digest naming the object
    pub digest: String,
}

/// Locations of a store under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
    dir: PathBuf,
}

impl StoreLayout {
    /// Layout for a store under `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            dir: root.join(STORE_DIR_NAME),
        }
    }

    /// The relocation root; manifest paths are relative to it.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The store directory itself.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory holding the objects.
    #[must_use]
    pub fn objects_dir(&self) -> PathBuf {
        self.dir.join(OBJECTS_DIR)
    }

    /// Path of the manifest file.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Path of the object for a hex digest.
    #[must_use]
    pub fn object_path(&self, hex: &str) -> PathBuf {
        self.objects_dir().join(hex)
    }

    /// Whether a store exists under the root.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// Create the store directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn ensure_dirs(&self) -> Result<(), StoreError> {
        let objects = self.objects_dir();
        fs::create_dir_all(&objects).map_err(|e| StoreError::io(&objects, e))
    }

    /// Copy `source` into the store under `digest`.
    ///
    /// Returns `false` without copying when the object already exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DigestMismatch`] if the bytes read differ from
    /// `digest`, leaving the store untouched.
    pub fn store_object(&self, source: &Path, digest: &Hash) -> Result<bool, StoreError> {
        let hex = hash_to_hex(digest);
        let target = self.object_path(&hex);
        if target.is_file() {
            log::debug!("Object {} already stored", hex);
            return Ok(false);
        }

        self.ensure_dirs()?;
        let temp = self
            .objects_dir()
            .join(format!(".tmp-{}-{}", hex, std::process::id()));

        let actual = match copy_hashed(source, &temp) {
            Ok(actual) => actual,
            Err(e) => {
                let _ = fs::remove_file(&temp);
                return Err(e);
            }
        };
        if actual != *digest {
            let _ = fs::remove_file(&temp);
            return Err(StoreError::DigestMismatch {
                path: source.to_path_buf(),
                expected: hex,
                actual: hash_to_hex(&actual),
            });
        }

        fs::rename(&temp, &target).map_err(|e| StoreError::io(&target, e))?;
        sync_dir(&self.objects_dir());
        log::debug!("Stored object {} from {}", hex, source.display());
        Ok(true)
    }

    /// Append one entry to the manifest and sync it.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be written.
    pub fn append_manifest(&self, entry: &ManifestEntry) -> Result<(), StoreError> {
        let path = self.manifest_path();
        let mut line = serde_json::to_string(entry)
            .map_err(|e| StoreError::io(&path, io::Error::other(e)))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.sync_data())
            .map_err(|e| StoreError::io(&path, e))
    }

    /// Read all manifest entries, in the order they were written.
    ///
    /// A missing manifest reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is unreadable or a line is malformed.
    pub fn read_manifest(&self) -> Result<Vec<ManifestEntry>, StoreError> {
        let path = self.manifest_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        content
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| {
                let entry: ManifestEntry =
                    serde_json::from_str(l).map_err(|e| StoreError::Manifest {
                        line: i + 1,
                        message: e.to_string(),
                    })?;
                // The digest names a file under objects/, so it must be a real digest
                if hex_to_hash(&entry.digest).is_none() {
                    return Err(StoreError::Manifest {
                        line: i + 1,
                        message: format!("invalid digest {:?}", entry.digest),
                    });
                }
                Ok(entry)
            })
            .collect()
    }

    /// Replace the manifest with `entries`, atomically.
    fn rewrite_manifest(&self, entries: &[ManifestEntry]) -> Result<(), StoreError> {
        let path = self.manifest_path();
        let temp = self.dir.join(format!(".{MANIFEST_FILE}.tmp"));
        let mut body = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry)
                .map_err(|e| StoreError::io(&temp, io::Error::other(e)))?;
            body.push_str(&line);
            body.push('\n');
        }

        let mut file = File::create(&temp).map_err(|e| StoreError::io(&temp, e))?;
        file.write_all(body.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| StoreError::io(&temp, e))?;
        fs::rename(&temp, &path).map_err(|e| StoreError::io(&path, e))
    }
}

/// Copy `source` to a new file at `dest`, syncing it, and return the digest
/// of the bytes copied.
fn copy_hashed(source: &Path, dest: &Path) -> Result<Hash, StoreError> {
    let mut input = File::open(source).map_err(|e| StoreError::io(source, e))?;
    let mut output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| StoreError::io(dest, e))?;

    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; COPY_BUFFER];
    loop {
        let read = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(StoreError::io(source, e)),
        };
        hasher.update(&buffer[..read]);
        output
            .write_all(&buffer[..read])
            .map_err(|e| StoreError::io(dest, e))?;
    }
    output.sync_all().map_err(|e| StoreError::io(dest, e))?;

    Ok(*hasher.finalize().as_bytes())
}

/// Best effort directory sync so a rename survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        log::debug!("Could not sync directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// Outcome of a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Files written back from the store
    pub files_restored: usize,
    /// Destinations that already held the right content
    pub already_present: usize,
    /// Objects deleted after all their paths were restored
    pub objects_removed: usize,
    /// Digests listed in the manifest without an object
    pub missing_objects: Vec<String>,
    /// Paths that could not be restored, with the reason
    pub failures: Vec<(String, String)>,
    /// Whether the whole store directory was removed
    pub store_removed: bool,
}

impl RestoreSummary {
    /// Whether everything in the manifest was restored.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_objects.is_empty() && self.failures.is_empty()
    }
}

/// Put every relocated file under `root` back in place.
///
/// Entries are grouped by digest. An object is deleted as soon as all of its
/// paths are restored. Entries that cannot be restored stay in the manifest
/// so a later run can retry them.
///
/// # Errors
///
/// Returns an error if there is no store under `root` or the manifest cannot
/// be read or rewritten. Per-file failures are collected in the summary.
pub fn restore(root: &Path) -> Result<RestoreSummary, StoreError> {
    let layout = StoreLayout::new(root);
    if !layout.exists() {
        return Err(StoreError::NotFound(root.to_path_buf()));
    }

    let entries = layout.read_manifest()?;
    let mut by_digest: BTreeMap<&str, Vec<&ManifestEntry>> = BTreeMap::new();
    for entry in &entries {
        by_digest.entry(entry.digest.as_str()).or_default().push(entry);
    }

    let mut summary = RestoreSummary::default();
    let mut remaining: Vec<ManifestEntry> = Vec::new();

    for (hex, group) in by_digest {
        let object = layout.object_path(hex);
        if !object.is_file() {
            log::error!("Missing object {} for {} path(s)", hex, group.len());
            summary.missing_objects.push(hex.to_string());
            remaining.extend(group.into_iter().cloned());
            continue;
        }

        let mut all_done = true;
        for entry in group {
            match restore_one(&layout, &object, entry) {
                Ok(true) => summary.files_restored += 1,
                Ok(false) => summary.already_present += 1,
                Err(message) => {
                    log::error!("Cannot restore {}: {}", entry.path, message);
                    summary.failures.push((entry.path.clone(), message));
                    remaining.push(entry.clone());
                    all_done = false;
                }
            }
        }

        if all_done {
            fs::remove_file(&object).map_err(|e| StoreError::io(&object, e))?;
            summary.objects_removed += 1;
        }
    }

    if remaining.is_empty() {
        let manifest = layout.manifest_path();
        if manifest.exists() {
            fs::remove_file(&manifest).map_err(|e| StoreError::io(&manifest, e))?;
        }
        match fs::remove_dir(layout.objects_dir()) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&layout.objects_dir(), e)),
        }
        fs::remove_dir(layout.dir()).map_err(|e| StoreError::io(layout.dir(), e))?;
        summary.store_removed = true;
        log::info!("Store removed: {}", layout.dir().display());
    } else {
        layout.rewrite_manifest(&remaining)?;
        log::warn!("{} manifest entries left to restore", remaining.len());
    }

    Ok(summary)
}

/// Restore a single path. `Ok(false)` means it already held the content.
fn restore_one(layout: &StoreLayout, object: &Path, entry: &ManifestEntry) -> Result<bool, String> {
    let dest = resolve_key(layout.root(), &entry.path)
        .ok_or_else(|| format!("path escapes the store root: {}", entry.path))?;

    if dest.exists() {
        let existing = crate::scanner::Hasher::new()
            .full_digest(&dest)
            .map_err(|e| e.to_string())?;
        if hash_to_hex(&existing) == entry.digest {
            log::debug!("Already present: {}", dest.display());
            return Ok(false);
        }
        return Err(format!(
            "{} exists with different content",
            dest.display()
        ));
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("{}: {}", parent.display(), e))?;
    }

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dest.with_file_name(format!(".{file_name}.dupestash-tmp"));
    let copied = copy_hashed(object, &temp).map_err(|e| {
        let _ = fs::remove_file(&temp);
        e.to_string()
    })?;
    if hash_to_hex(&copied) != entry.digest {
        let _ = fs::remove_file(&temp);
        return Err(format!("object {} is corrupt", entry.digest));
    }
    fs::rename(&temp, &dest).map_err(|e| format!("{}: {}", dest.display(), e))?;

    log::info!("Restored {}", dest.display());
    Ok(true)
}
