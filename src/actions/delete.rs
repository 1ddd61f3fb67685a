//! File removal primitives.
//!
//! Two ways to get rid of a confirmed duplicate:
//! - Permanent deletion with `std::fs::remove_file` (the default)
//! - Moving it to the system trash with the `trash` crate (recoverable)
//!
//! [`FileSnapshot`] guards against the file changing between the moment it
//! was hashed and the moment it is removed.
//!
//! # Example
//!
//! ```no_run
//! use dupestash::actions::delete::{remove_file, FileSnapshot};
//! use dupestash::actions::DeleteMethod;
//! use std::path::Path;
//!
//! let path = Path::new("/path/to/duplicate.txt");
//! let snapshot = FileSnapshot::capture(path).unwrap();
//! snapshot.verify_matches(1024, None).unwrap();
//! remove_file(path, DeleteMethod::Trash).unwrap();
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{ActionError, DeleteMethod};

/// File metadata snapshot for change detection.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    /// Path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mtime: Option<SystemTime>,
}

impl FileSnapshot {
    /// Capture a file's current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist or can't be accessed.
    pub fn capture(path: &Path) -> Result<Self, ActionError> {
        let metadata = fs::metadata(path).map_err(|e| io_to_action(path, e))?;

        if !metadata.is_file() {
            return Err(ActionError::NotAFile(path.to_path_buf()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            mtime: metadata.modified().ok(),
        })
    }

    /// Check the file still has the size recorded when it was hashed.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Modified`] on a size change.
    pub fn verify_size(&self, expected: u64) -> Result<(), ActionError> {
        if self.size != expected {
            log::warn!(
                "File modified since scan: {} (size changed from {} to {})",
                self.path.display(),
                expected,
                self.size
            );
            return Err(ActionError::Modified(self.path.clone()));
        }
        Ok(())
    }

    /// Check size and mtime against the values seen when the file was hashed.
    ///
    /// An mtime missing on either side is not compared.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Modified`] if size or mtime differ.
    pub fn verify_matches(
        &self,
        size: u64,
        mtime: Option<SystemTime>,
    ) -> Result<(), ActionError> {
        self.verify_size(size)?;

        if let (Some(before), Some(now)) = (mtime, self.mtime) {
            if before != now {
                log::warn!(
                    "File modified since scan: {} (mtime changed)",
                    self.path.display()
                );
                return Err(ActionError::Modified(self.path.clone()));
            }
        }
        Ok(())
    }
}

/// Map an I/O error on `path` to an [`ActionError`].
pub(crate) fn io_to_action(path: &Path, e: io::Error) -> ActionError {
    match e.kind() {
        io::ErrorKind::NotFound => ActionError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => ActionError::PermissionDenied(path.to_path_buf()),
        _ => ActionError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    }
}

/// Move a file to the system trash.
///
/// # Errors
///
/// Returns [`ActionError::TrashFailed`] if the platform trash refuses it.
pub fn delete_to_trash(path: &Path) -> Result<(), ActionError> {
    trash::delete(path).map_err(|e| {
        log::error!("Trash operation failed for {}: {}", path.display(), e);
        ActionError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Moved to trash: {}", path.display());
    Ok(())
}

/// Permanently delete a file. This cannot be undone.
///
/// # Errors
///
/// Returns an error if the file is missing or cannot be removed.
pub fn permanent_delete(path: &Path) -> Result<(), ActionError> {
    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        io_to_action(path, e)
    })?;

    log::info!("Permanently deleted: {}", path.display());
    Ok(())
}

/// Remove a file with the given method.
///
/// # Errors
///
/// See [`permanent_delete`] and [`delete_to_trash`].
pub fn remove_file(path: &Path, method: DeleteMethod) -> Result<(), ActionError> {
    match method {
        DeleteMethod::Permanent => permanent_delete(path),
        DeleteMethod::Trash => delete_to_trash(path),
    }
}
