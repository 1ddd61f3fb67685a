//! CSV inventory of duplicate sets (`--output csv`).
//!
//! One `hash,size,path` row for every file in a set of identical files:
//! the surviving original first, then each copy found after it. Files
//! without a duplicate are not listed.
//!
//! ```text
//! hash,size,path
//! af13...,1024,/data/a.bin
//! af13...,1024,/data/b.bin
//! ```

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::actions::PairRecord;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    hash: &'a str,
    size: u64,
    path: String,
}

/// Duplicate sets rebuilt from the pairs a run produced.
struct DuplicateSet<'a> {
    hash: &'a str,
    size: u64,
    paths: Vec<&'a Path>,
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    pairs: &'a [PairRecord],
}

impl<'a> CsvOutput<'a> {
    /// Create a formatter over the recorded pairs.
    #[must_use]
    pub fn new(pairs: &'a [PairRecord]) -> Self {
        Self { pairs }
    }

    /// Group pairs by digest in the order their sets were first seen.
    fn sets(&self) -> Vec<DuplicateSet<'a>> {
        let mut sets: Vec<DuplicateSet<'a>> = Vec::new();
        let mut by_digest: HashMap<&str, usize> = HashMap::new();
        let mut listed: HashSet<&Path> = HashSet::new();

        for pair in self.pairs {
            let idx = *by_digest.entry(pair.digest.as_str()).or_insert_with(|| {
                sets.push(DuplicateSet {
                    hash: &pair.digest,
                    size: pair.size,
                    paths: Vec::new(),
                });
                sets.len() - 1
            });
            for path in [pair.original.as_path(), pair.duplicate.as_path()] {
                if listed.insert(path) {
                    sets[idx].paths.push(path);
                }
            }
        }
        sets
    }

    /// Write the header and one row per file.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        // Header written by hand so it appears even when nothing was found
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv_writer.write_record(["hash", "size", "path"])?;

        for set in self.sets() {
            for path in set.paths {
                csv_writer.serialize(CsvRow {
                    hash: set.hash,
                    size: set.size,
                    path: path.to_string_lossy().into_owned(),
                })?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
