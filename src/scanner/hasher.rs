//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! [`Hasher`] computes a digest over either the whole file or a bounded
//! prefix of it. Files are read in fixed-size chunks into a reusable buffer,
//! so memory use does not depend on file size.
//!
//! Hashing the first `n` bytes of a file no larger than `n` reads the whole
//! file, so its prefix digest and full digest are the same value. Callers use
//! that to skip the second read for small files.
//!
//! # Example
//!
//! ```no_run
//! use dupestash::scanner::{hash_to_hex, Hasher, DEFAULT_PREFIX_WINDOW};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let prefix = hasher.prefix_digest(Path::new("big.iso"), DEFAULT_PREFIX_WINDOW).unwrap();
//! let full = hasher.full_digest(Path::new("big.iso")).unwrap();
//! println!("{} / {}", hash_to_hex(&prefix), hash_to_hex(&full));
//! ```

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use super::HashError;

/// A 256-bit BLAKE3 digest.
pub type Hash = [u8; 32];

/// Default size of the cheap prefix window (1 MiB).
pub const DEFAULT_PREFIX_WINDOW: u64 = 1024 * 1024;

/// Read buffer size used for streaming.
const BUFFER_SIZE: usize = 64 * 1024;

/// Streaming file hasher.
///
/// The hasher is shareable across threads; the counters are atomics used to
/// observe how much hashing work a run performed.
#[derive(Debug, Default)]
pub struct Hasher {
    prefix_calls: AtomicU64,
    full_calls: AtomicU64,
    bytes_read: AtomicU64,
}

impl Hasher {
    /// Create a new hasher with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest at most `limit` bytes of `path`, or the whole file when `limit` is `None`.
    ///
    /// Reading stops at `limit` bytes or end-of-file, whichever comes first.
    /// The file handle is closed on every exit path.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or a read fails
    /// part-way through.
    pub fn digest(&self, path: &Path, limit: Option<u64>) -> Result<Hash, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut remaining = limit.unwrap_or(u64::MAX);
        let mut total = 0u64;

        while remaining > 0 {
            let want = usize::try_from(remaining).map_or(BUFFER_SIZE, |r| r.min(BUFFER_SIZE));
            let read = match file.read(&mut buffer[..want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..read]);
            remaining -= read as u64;
            total += read as u64;
        }

        self.bytes_read.fetch_add(total, Ordering::Relaxed);
        log::trace!(
            "Hashed {} bytes of {} (limit {:?})",
            total,
            path.display(),
            limit
        );

        Ok(*hasher.finalize().as_bytes())
    }

    /// Digest the first `window` bytes of a file.
    ///
    /// # Errors
    ///
    /// See [`Hasher::digest`].
    pub fn prefix_digest(&self, path: &Path, window: u64) -> Result<Hash, HashError> {
        self.prefix_calls.fetch_add(1, Ordering::Relaxed);
        self.digest(path, Some(window))
    }

    /// Digest the entire file.
    ///
    /// # Errors
    ///
    /// See [`Hasher::digest`].
    pub fn full_digest(&self, path: &Path) -> Result<Hash, HashError> {
        self.full_calls.fetch_add(1, Ordering::Relaxed);
        self.digest(path, None)
    }

    /// Number of prefix digests requested so far.
    #[must_use]
    pub fn prefix_calls(&self) -> u64 {
        self.prefix_calls.load(Ordering::Relaxed)
    }

    /// Number of full digests requested so far.
    #[must_use]
    pub fn full_calls(&self) -> u64 {
        self.full_calls.load(Ordering::Relaxed)
    }

    /// Total bytes read by all digests.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }
}

/// Format a digest as lowercase hexadecimal.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from_bytes(*hash).to_hex().to_string()
}

/// Parse a 64-character hexadecimal digest.
///
/// Returns `None` if the string is not a valid digest.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    blake3::Hash::from_hex(hex).ok().map(|h| *h.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_full_digest_known_value() {
        let file = temp_with(b"hello world");
        let hasher = Hasher::new();
        let hash = hasher.full_digest(file.path()).unwrap();
        assert_eq!(
            hash_to_hex(&hash),
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }

    #[test]
    fn test_empty_file() {
        let file = temp_with(b"");
        let hasher = Hasher::new();
        let hash = hasher.full_digest(file.path()).unwrap();
        assert_eq!(hash, *blake3::hash(b"").as_bytes());
    }

    #[test]
    fn test_prefix_stops_at_limit() {
        let file = temp_with(b"abcdefgh");
        let hasher = Hasher::new();
        let prefix = hasher.prefix_digest(file.path(), 4).unwrap();
        assert_eq!(prefix, *blake3::hash(b"abcd").as_bytes());
        assert_eq!(hasher.bytes_read(), 4);
    }

    #[test]
    fn test_prefix_equals_full_for_small_file() {
        let file = temp_with(&[b'A'; 500]);
        let hasher = Hasher::new();
        let prefix = hasher.prefix_digest(file.path(), DEFAULT_PREFIX_WINDOW).unwrap();
        let full = hasher.full_digest(file.path()).unwrap();
        assert_eq!(prefix, full);
    }

    #[test]
    fn test_multi_chunk_file() {
        let data: Vec<u8> = (0..(BUFFER_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let file = temp_with(&data);
        let hasher = Hasher::new();
        let full = hasher.full_digest(file.path()).unwrap();
        assert_eq!(full, *blake3::hash(&data).as_bytes());
        assert_eq!(hasher.bytes_read(), data.len() as u64);
    }

    #[test]
    fn test_counters() {
        let file = temp_with(b"counted");
        let hasher = Hasher::new();
        hasher.prefix_digest(file.path(), 2).unwrap();
        hasher.full_digest(file.path()).unwrap();
        hasher.full_digest(file.path()).unwrap();
        assert_eq!(hasher.prefix_calls(), 1);
        assert_eq!(hasher.full_calls(), 2);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let hasher = Hasher::new();
        let err = hasher
            .full_digest(Path::new("/definitely/not/here.bin"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = *blake3::hash(b"x").as_bytes();
        assert_eq!(hex_to_hash(&hash_to_hex(&hash)), Some(hash));
        assert_eq!(hex_to_hash("not-hex"), None);
    }
}
