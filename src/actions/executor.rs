//! Disposition of confirmed duplicates.
//!
//! [`ActionExecutor::dispose`] receives one `(duplicate, original)` pair at
//! a time, after full digests matched. Depending on the [`ActionMode`] it
//! reports the pair, deletes the duplicate or relocates it into a
//! content-addressed store.
//!
//! Before any mutation the executor checks that both files still have the
//! size and mtime they were hashed at, then journals the action. Only then
//! is the filesystem touched.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use yansi::Paint;

use super::delete::{io_to_action, remove_file, FileSnapshot};
use super::journal::{ActionJournal, JournalAction, JournalEntry, JournalPhase};
use super::store::{ManifestEntry, StoreError, StoreLayout};
use crate::duplicates::FileRecord;
use crate::scanner::hash_to_hex;
use crate::scanner::path_utils::relative_key;

/// How duplicates are deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMethod {
    /// Irreversible removal
    #[default]
    Permanent,
    /// Move to the system trash
    Trash,
}

/// What to do with each confirmed duplicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionMode {
    /// Print the pair and count its bytes; touch nothing.
    Report,
    /// Remove the duplicate.
    Delete(DeleteMethod),
    /// Move the duplicate into the content store under this layout.
    Relocate(StoreLayout),
}

impl ActionMode {
    /// Whether this mode changes the filesystem.
    #[must_use]
    pub fn mutates(&self) -> bool {
        !matches!(self, Self::Report)
    }
}

/// Errors from a single disposition. None of them stop a run.
#[derive(thiserror::Error, Debug)]
pub enum ActionError {
    /// The duplicate disappeared.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Not a regular file.
    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    /// The duplicate changed since it was hashed.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// The surviving copy is gone, so the duplicate is the last one.
    #[error("original missing or changed, keeping {duplicate} (original {original})")]
    OriginalMissing {
        /// Duplicate that was kept
        duplicate: PathBuf,
        /// Original that vanished or changed
        original: PathBuf,
    },

    /// The pair was handed over without a full digest.
    #[error("no full digest recorded for {0}")]
    MissingDigest(PathBuf),

    /// The duplicate is outside the relocation root.
    #[error("{path} is outside the store root {root}")]
    OutsideRoot {
        /// File path
        path: PathBuf,
        /// Store root
        root: PathBuf,
    },

    /// The name cannot be written to the manifest exactly, so it stays put.
    #[error("cannot record {0} in the store manifest: name is not portable UTF-8")]
    UnstorableName(PathBuf),

    /// The journal could not be written, so nothing was done.
    #[error("cannot write journal {path}: {source}")]
    Journal {
        /// Journal path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// File path
        path: PathBuf,
        /// Platform message
        message: String,
    },

    /// Content store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Other I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// What happened to one duplicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispositionResult {
    /// Reported only.
    Reported {
        /// Duplicate size
        bytes: u64,
    },
    /// Deleted.
    Deleted {
        /// Removed path
        path: PathBuf,
        /// Bytes freed
        bytes: u64,
        /// How it was removed
        method: DeleteMethod,
    },
    /// Moved into the store.
    Relocated {
        /// Source path, now removed
        path: PathBuf,
        /// Object name
        digest: String,
        /// Bytes freed outside the store
        bytes: u64,
        /// Whether a new object was written (false when the digest was stored already)
        stored_new_object: bool,
    },
}

/// One disposition, kept when the executor records pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairRecord {
    /// The file reported, removed or relocated
    pub duplicate: PathBuf,
    /// The surviving copy
    pub original: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Hex full digest
    pub digest: String,
    /// `reported`, `deleted`, `trashed`, `relocated` or `failed`
    pub outcome: &'static str,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Running totals of the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    /// Pairs reported without mutation
    pub reported: usize,
    /// Bytes held by reported duplicates
    pub reported_bytes: u64,
    /// Files deleted
    pub deleted: usize,
    /// Files moved into the store
    pub relocated: usize,
    /// New objects written to the store
    pub objects_stored: usize,
    /// Bytes freed by deletion or relocation
    pub bytes_reclaimed: u64,
    /// Dispositions that failed
    pub failures: usize,
}

/// Applies the configured disposition to confirmed duplicates.
pub struct ActionExecutor {
    mode: ActionMode,
    journal: Option<ActionJournal>,
    report: Option<Box<dyn Write + Send>>,
    pairs: Option<Vec<PairRecord>>,
    stats: ExecutorStats,
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("mode", &self.mode)
            .field("journal", &self.journal)
            .field("report", &self.report.as_ref().map(|_| "<writer>"))
            .field("pairs", &self.pairs.as_ref().map(Vec::len))
            .field("stats", &self.stats)
            .finish()
    }
}

impl ActionExecutor {
    /// Create an executor without journal or report output.
    #[must_use]
    pub fn new(mode: ActionMode) -> Self {
        Self {
            mode,
            journal: None,
            report: None,
            pairs: None,
            stats: ExecutorStats::default(),
        }
    }

    /// Journal every mutation to `journal`.
    #[must_use]
    pub fn with_journal(mut self, journal: ActionJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Write one human-readable line per disposition to `writer`.
    #[must_use]
    pub fn with_report_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.report = Some(writer);
        self
    }

    /// Keep a [`PairRecord`] for every disposition.
    #[must_use]
    pub fn with_pair_log(mut self) -> Self {
        self.pairs = Some(Vec::new());
        self
    }

    /// Recorded pairs, empty unless enabled with [`with_pair_log`](Self::with_pair_log).
    #[must_use]
    pub fn pairs(&self) -> &[PairRecord] {
        self.pairs.as_deref().unwrap_or_default()
    }

    /// Whether dispositions change the filesystem.
    #[must_use]
    pub fn mutates(&self) -> bool {
        self.mode.mutates()
    }

    /// Store directory to keep out of the scan, in relocate mode.
    #[must_use]
    pub fn store_dir(&self) -> Option<&Path> {
        match &self.mode {
            ActionMode::Relocate(layout) => Some(layout.dir()),
            _ => None,
        }
    }

    /// Totals so far.
    #[must_use]
    pub fn stats(&self) -> &ExecutorStats {
        &self.stats
    }

    /// Dispose of `duplicate`, whose content equals `original`.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] if the pair no longer checks out or the
    /// mutation fails. The failure is journalled and counted.
    pub fn dispose(
        &mut self,
        duplicate: &FileRecord,
        original: &FileRecord,
    ) -> Result<DispositionResult, ActionError> {
        let result = match self.mode.clone() {
            ActionMode::Report => Ok(self.report_pair(duplicate, original)),
            ActionMode::Delete(method) => self.delete(duplicate, original, method),
            ActionMode::Relocate(layout) => self.relocate(duplicate, original, &layout),
        };
        if let Err(ref e) = result {
            self.stats.failures += 1;
            log::warn!("Kept {}: {}", duplicate.path.display(), e);
        }
        if let Some(pairs) = self.pairs.as_mut() {
            let outcome = match &result {
                Ok(DispositionResult::Reported { .. }) => "reported",
                Ok(DispositionResult::Deleted {
                    method: DeleteMethod::Permanent,
                    ..
                }) => "deleted",
                Ok(DispositionResult::Deleted { .. }) => "trashed",
                Ok(DispositionResult::Relocated { .. }) => "relocated",
                Err(_) => "failed",
            };
            pairs.push(PairRecord {
                duplicate: duplicate.path.clone(),
                original: original.path.clone(),
                size: duplicate.size,
                digest: duplicate.full_hex(),
                outcome,
                error: result.as_ref().err().map(ToString::to_string),
            });
        }
        result
    }

    fn report_pair(&mut self, duplicate: &FileRecord, original: &FileRecord) -> DispositionResult {
        self.stats.reported += 1;
        self.stats.reported_bytes += duplicate.size;
        log::info!(
            "Duplicate {} of {} ({} bytes, {})",
            duplicate.path.display(),
            original.path.display(),
            duplicate.size,
            duplicate.full_hex()
        );
        self.emit(format!(
            "{} {} <=> {} [{}]",
            "DUP:".yellow().bold(),
            duplicate.path.display(),
            original.path.display(),
            bytesize::ByteSize::b(duplicate.size)
        ));
        DispositionResult::Reported {
            bytes: duplicate.size,
        }
    }

    fn delete(
        &mut self,
        duplicate: &FileRecord,
        original: &FileRecord,
        method: DeleteMethod,
    ) -> Result<DispositionResult, ActionError> {
        check_pair(duplicate, original)?;
        let action = match method {
            DeleteMethod::Permanent => JournalAction::Delete,
            DeleteMethod::Trash => JournalAction::Trash,
        };

        self.journal(action, JournalPhase::Begin, duplicate, original, None)?;
        match remove_file(&duplicate.path, method) {
            Ok(()) => {
                self.journal_done(action, duplicate, original);
                self.stats.deleted += 1;
                self.stats.bytes_reclaimed += duplicate.size;
                self.emit(format!(
                    "{} {} (duplicate of {})",
                    "DEL:".red().bold(),
                    duplicate.path.display(),
                    original.path.display()
                ));
                Ok(DispositionResult::Deleted {
                    path: duplicate.path.clone(),
                    bytes: duplicate.size,
                    method,
                })
            }
            Err(e) => {
                self.journal_failure(action, duplicate, original, &e);
                Err(e)
            }
        }
    }

    fn relocate(
        &mut self,
        duplicate: &FileRecord,
        original: &FileRecord,
        layout: &StoreLayout,
    ) -> Result<DispositionResult, ActionError> {
        let digest = *duplicate
            .full_digest
            .get()
            .ok_or_else(|| ActionError::MissingDigest(duplicate.path.clone()))?;
        if !duplicate.path.starts_with(layout.root()) {
            return Err(ActionError::OutsideRoot {
                path: duplicate.path.clone(),
                root: layout.root().to_path_buf(),
            });
        }
        let rel = relative_key(&duplicate.path, layout.root())
            .ok_or_else(|| ActionError::UnstorableName(duplicate.path.clone()))?;
        check_pair(duplicate, original)?;

        let action = JournalAction::Relocate;
        self.journal(action, JournalPhase::Begin, duplicate, original, None)?;

        let hex = hash_to_hex(&digest);
        let moved = layout
            .store_object(&duplicate.path, &digest)
            .and_then(|stored_new| {
                layout.append_manifest(&ManifestEntry {
                    path: rel,
                    digest: hex.clone(),
                })?;
                Ok(stored_new)
            })
            .map_err(ActionError::from)
            .and_then(|stored_new| {
                std::fs::remove_file(&duplicate.path)
                    .map_err(|e| io_to_action(&duplicate.path, e))?;
                Ok(stored_new)
            });

        match moved {
            Ok(stored_new_object) => {
                self.journal_done(action, duplicate, original);
                self.stats.relocated += 1;
                self.stats.bytes_reclaimed += duplicate.size;
                if stored_new_object {
                    self.stats.objects_stored += 1;
                }
                log::info!("Relocated {} -> {}", duplicate.path.display(), hex);
                self.emit(format!(
                    "{} {} -> {}",
                    "MOV:".cyan().bold(),
                    duplicate.path.display(),
                    hex
                ));
                Ok(DispositionResult::Relocated {
                    path: duplicate.path.clone(),
                    digest: hex,
                    bytes: duplicate.size,
                    stored_new_object,
                })
            }
            Err(e) => {
                self.journal_failure(action, duplicate, original, &e);
                Err(e)
            }
        }
    }

    fn journal(
        &mut self,
        action: JournalAction,
        phase: JournalPhase,
        duplicate: &FileRecord,
        original: &FileRecord,
        error: Option<String>,
    ) -> Result<(), ActionError> {
        let Some(journal) = self.journal.as_mut() else {
            // Without a journal the log line is the only record left behind
            if phase == JournalPhase::Begin {
                log::warn!(
                    "{:?} {} (original {}, digest {}, {} bytes), no journal configured",
                    action,
                    duplicate.path.display(),
                    original.path.display(),
                    duplicate.full_hex(),
                    duplicate.size
                );
            }
            return Ok(());
        };
        let entry = JournalEntry {
            timestamp: Utc::now(),
            action,
            phase,
            source: duplicate.path.clone(),
            original: original.path.clone(),
            digest: duplicate.full_hex(),
            size: duplicate.size,
            error,
        };
        journal.append(&entry).map_err(|source| ActionError::Journal {
            path: journal.path().to_path_buf(),
            source,
        })
    }

    /// The mutation already happened; a journal error here is only logged.
    fn journal_done(&mut self, action: JournalAction, duplicate: &FileRecord, original: &FileRecord) {
        if let Err(e) = self.journal(action, JournalPhase::Done, duplicate, original, None) {
            log::error!("{}", e);
        }
    }

    fn journal_failure(
        &mut self,
        action: JournalAction,
        duplicate: &FileRecord,
        original: &FileRecord,
        error: &ActionError,
    ) {
        let failed = self.journal(
            action,
            JournalPhase::Failed,
            duplicate,
            original,
            Some(error.to_string()),
        );
        if let Err(e) = failed {
            log::error!("{}", e);
        }
    }

    fn emit(&mut self, line: String) {
        if let Some(writer) = self.report.as_mut() {
            if let Err(e) = writeln!(writer, "{line}") {
                log::debug!("Report output failed: {}", e);
            }
        }
    }
}

/// Both files must still match the size and mtime they were hashed at.
fn check_pair(duplicate: &FileRecord, original: &FileRecord) -> Result<(), ActionError> {
    FileSnapshot::capture(&duplicate.path)?.verify_matches(duplicate.size, duplicate.modified)?;

    let original_ok = FileSnapshot::capture(&original.path)
        .ok()
        .is_some_and(|snap| snap.verify_matches(original.size, original.modified).is_ok());
    if !original_ok {
        return Err(ActionError::OriginalMissing {
            duplicate: duplicate.path.clone(),
            original: original.path.clone(),
        });
    }
    Ok(())
}
