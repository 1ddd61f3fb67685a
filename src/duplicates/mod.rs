//! Duplicate detection module.
//!
//! This module provides:
//! - The candidate index keyed by size or (name, size)
//! - The staged resolver (key lookup, prefix digest, full digest)
//! - The run orchestrator tying walker, resolver and executor together

pub mod finder;
pub mod groups;

pub use finder::{
    prepare_roots, Disposition, DuplicateFinder, DuplicateResolver, FinderConfig, FinderError,
    ResolveError, ResolverConfig, ResolverStats, RunSummary,
};
pub use groups::{CandidateGroup, CandidateIndex, DigestState, FileRecord, GroupKey};
