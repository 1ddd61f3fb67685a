//! Append-only log of destructive actions.
//!
//! Each mutation is written as one JSON line *before* the filesystem is
//! touched, followed by a second line with the outcome. A crash in between
//! leaves a `begin` line without a matching `done`, which is enough to find
//! the file that was being processed.
//!
//! ```text
//! {"timestamp":"2026-01-02T03:04:05Z","action":"relocate","phase":"begin","source":"/d/b.bin","original":"/d/a.bin","digest":"af13...","size":4096}
//! {"timestamp":"2026-01-02T03:04:05Z","action":"relocate","phase":"done","source":"/d/b.bin","original":"/d/a.bin","digest":"af13...","size":4096}
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of mutation recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalAction {
    /// Permanent deletion
    Delete,
    /// Move to the system trash
    Trash,
    /// Move into the content store
    Relocate,
}

/// Where in the action the line was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalPhase {
    /// About to mutate
    Begin,
    /// Mutation succeeded
    Done,
    /// Mutation failed
    Failed,
}

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// When the line was written
    pub timestamp: DateTime<Utc>,
    /// What was done
    pub action: JournalAction,
    /// Begin, done or failed
    pub phase: JournalPhase,
    /// The duplicate being removed
    pub source: PathBuf,
    /// The surviving copy it matched
    pub original: PathBuf,
    /// Hex full digest shared by both
    pub digest: String,
    /// File size in bytes
    pub size: u64,
    /// Failure message, only on `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Durable, append-only action journal.
#[derive(Debug)]
pub struct ActionJournal {
    path: PathBuf,
    file: File,
}

impl ActionJournal {
    /// Open (or create) a journal, appending to any existing content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for appending.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::debug!("Journal opened: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and sync it to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, the write or the sync fails.
    pub fn append(&mut self, entry: &JournalEntry) -> io::Result<()> {
        let mut line = serde_json::to_string(entry).map_err(io::Error::other)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()
    }

    /// Read every entry of a journal file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is malformed.
    pub fn read_entries(path: &Path) -> io::Result<Vec<JournalEntry>> {
        let content = std::fs::read_to_string(path)?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(io::Error::other))
            .collect()
    }
}
