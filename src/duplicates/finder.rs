//! Staged duplicate resolution and the run orchestrator.
//!
//! # Overview
//!
//! [`DuplicateResolver`] decides, one file at a time, whether a newly seen
//! file duplicates something already indexed:
//!
//! 1. **Key lookup**: the first file under a [`GroupKey`] is recorded
//!    without reading it.
//! 2. **Prefix comparison**: when a second file shares the key, prefix
//!    digests are computed for it and for any candidate still missing one.
//!    No prefix match means the file is unique.
//! 3. **Full comparison**: on a prefix match, full digests are computed
//!    (again filling in the candidate's lazily) and compared against every
//!    candidate with that prefix.
//!
//! Files no larger than the prefix window are read once; that digest serves
//! as both prefix and full digest.
//!
//! The first file seen under a key always survives. Which copy that is
//! depends only on traversal order.
//!
//! [`DuplicateFinder`] walks one or more roots, feeds every file to a
//! resolver and hands confirmed duplicates to an
//! [`ActionExecutor`](crate::actions::ActionExecutor).
//!
//! # Example
//!
//! ```no_run
//! use dupestash::actions::{ActionExecutor, ActionMode};
//! use dupestash::duplicates::{DuplicateFinder, FinderConfig};
//! use std::path::PathBuf;
//!
//! let finder = DuplicateFinder::new(FinderConfig::default());
//! let mut executor = ActionExecutor::new(ActionMode::Report);
//! let summary = finder.run(&[PathBuf::from(".")], &mut executor).unwrap();
//! println!("{} duplicates, {} bytes", summary.duplicates, summary.duplicate_bytes);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::groups::{CandidateGroup, CandidateIndex, DigestState, FileRecord, GroupKey};
use crate::actions::{ActionExecutor, ExecutorStats};
use crate::progress::ProgressCallback;
use crate::scanner::path_utils::non_overlapping_roots;
use crate::scanner::{
    hash_to_hex, prune_empty_dirs, FileEntry, HardlinkTracker, Hash, HashError, Hasher,
    ScanError, Walker, WalkerConfig, DEFAULT_PREFIX_WINDOW,
};

/// Configuration for the resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Files smaller than this are not indexed at all.
    pub min_size: u64,
    /// Group by size alone instead of (name, size).
    pub ignore_name: bool,
    /// Log the key and path of every file.
    pub verbose: bool,
    /// Size of the cheap prefix digest in bytes.
    pub prefix_window: u64,
    /// Number of threads used for hashing.
    pub io_threads: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            ignore_name: true,
            verbose: false,
            prefix_window: DEFAULT_PREFIX_WINDOW,
            io_threads: 4,
        }
    }
}

impl ResolverConfig {
    /// Set the minimum file size.
    #[must_use]
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    /// Group by size alone (true) or by name and size (false).
    #[must_use]
    pub fn with_ignore_name(mut self, ignore_name: bool) -> Self {
        self.ignore_name = ignore_name;
        self
    }

    /// Set the prefix window, at least one byte.
    #[must_use]
    pub fn with_prefix_window(mut self, bytes: u64) -> Self {
        self.prefix_window = bytes.max(1);
        self
    }

    /// Set the hashing thread count, at least one.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Enable per-file trace logging.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Outcome of observing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// No identical file indexed; the file was added as a new candidate.
    Unique,
    /// Full digests match an indexed file.
    DuplicateOf {
        /// The file just observed (both digests computed).
        duplicate: FileRecord,
        /// The surviving, first-seen file.
        original: FileRecord,
    },
    /// Below the minimum size, or the same path was already indexed.
    Excluded,
}

impl Disposition {
    /// Whether this is a confirmed duplicate.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateOf { .. })
    }
}

/// Errors that make a file unprocessable.
///
/// None of these stop a run; the file is skipped.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    /// The new file itself could not be hashed.
    #[error("cannot hash {path}: {source}")]
    Unreadable {
        /// File that failed
        path: PathBuf,
        /// Underlying hash error
        #[source]
        source: HashError,
    },
}

/// Counters kept by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Files passed to `observe`
    pub files_seen: usize,
    /// Files below the minimum size or seen twice
    pub excluded: usize,
    /// Files indexed as unique
    pub unique: usize,
    /// Confirmed duplicates
    pub duplicates: usize,
    /// Bytes held by confirmed duplicates
    pub duplicate_bytes: u64,
    /// Files skipped because they could not be hashed
    pub skipped: usize,
    /// Candidates dropped because their file disappeared
    pub stale_removed: usize,
    /// Comparisons abandoned because a candidate could not be hashed
    pub incomplete_comparisons: usize,
}

/// Result of filling in a candidate digest.
enum Backfill {
    Done(usize, Hash),
    Stale(usize),
    Failed(usize),
}

/// The staged comparison engine.
///
/// Owns its [`CandidateIndex`]; create one resolver per run.
pub struct DuplicateResolver {
    config: ResolverConfig,
    hasher: Arc<Hasher>,
    index: CandidateIndex,
    pool: Option<rayon::ThreadPool>,
    stats: ResolverStats,
}

impl std::fmt::Debug for DuplicateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateResolver")
            .field("config", &self.config)
            .field("index_records", &self.index.len())
            .field("pool", &self.pool.as_ref().map(|_| "<pool>"))
            .field("stats", &self.stats)
            .finish()
    }
}

impl DuplicateResolver {
    /// Create a resolver with its own hasher.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_hasher(config, Arc::new(Hasher::new()))
    }

    /// Create a resolver that hashes through `hasher`.
    #[must_use]
    pub fn with_hasher(config: ResolverConfig, hasher: Arc<Hasher>) -> Self {
        let pool = if config.io_threads > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.io_threads)
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    log::warn!("Failed to create hashing thread pool, hashing serially: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            config,
            hasher,
            index: CandidateIndex::new(),
            pool,
            stats: ResolverStats::default(),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    /// The index built so far.
    #[must_use]
    pub fn index(&self) -> &CandidateIndex {
        &self.index
    }

    /// The hasher, for its counters.
    #[must_use]
    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }

    /// Evaluate one file against the index, updating the index.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unreadable`] if the file could not be hashed.
    /// The file is not indexed in that case and the caller should move on.
    pub fn observe(&mut self, entry: &FileEntry) -> Result<Disposition, ResolveError> {
        self.stats.files_seen += 1;

        if entry.size < self.config.min_size {
            log::trace!("Below minimum size ({}): {}", entry.size, entry.path.display());
            self.stats.excluded += 1;
            return Ok(Disposition::Excluded);
        }

        let key = GroupKey::for_file(&entry.name, entry.size, self.config.ignore_name);
        if self.config.verbose {
            log::info!("({}) {}", key, entry.path.display());
        }

        let Some(group) = self.index.lookup_mut(&key) else {
            self.index
                .insert(key, FileRecord::from_entry(entry));
            self.stats.unique += 1;
            return Ok(Disposition::Unique);
        };

        if group.records().iter().any(|r| r.path == entry.path) {
            log::debug!("Already indexed: {}", entry.path.display());
            self.stats.excluded += 1;
            return Ok(Disposition::Excluded);
        }

        let ctx = HashContext {
            hasher: &self.hasher,
            pool: self.pool.as_ref(),
            window: self.config.prefix_window,
        };
        let outcome = compare_against_group(&ctx, group, entry, &mut self.stats);
        let group_now_empty = group.is_empty();

        debug_assert!(
            self.index.lookup(&key).map_or(true, CandidateGroup::is_consistent),
            "group {key} violates the lazy digest invariant"
        );
        if group_now_empty {
            self.index.remove_if_empty(&key);
        }

        match outcome {
            Comparison::Unique(record) => {
                self.index.insert(key, record);
                self.stats.unique += 1;
                Ok(Disposition::Unique)
            }
            Comparison::Duplicate(duplicate, original) => {
                self.stats.duplicates += 1;
                self.stats.duplicate_bytes += duplicate.size;
                log::debug!(
                    "Duplicate: {} == {} [{}]",
                    duplicate.path.display(),
                    original.path.display(),
                    duplicate.full_hex()
                );
                Ok(Disposition::DuplicateOf {
                    duplicate,
                    original,
                })
            }
            Comparison::Unreadable(source) => {
                log::warn!("Skipping {}: {}", entry.path.display(), source);
                self.stats.skipped += 1;
                Err(ResolveError::Unreadable {
                    path: entry.path.clone(),
                    source,
                })
            }
        }
    }

    /// Observe every entry in order, collecting duplicate pairs.
    ///
    /// Unreadable files are logged and skipped.
    pub fn resolve_all<'a, I>(&mut self, entries: I) -> Vec<(FileRecord, FileRecord)>
    where
        I: IntoIterator<Item = &'a FileEntry>,
    {
        entries
            .into_iter()
            .filter_map(|entry| match self.observe(entry) {
                Ok(Disposition::DuplicateOf {
                    duplicate,
                    original,
                }) => Some((duplicate, original)),
                _ => None,
            })
            .collect()
    }
}

/// Result of comparing a new file against its group.
enum Comparison {
    /// No match; the record to index.
    Unique(FileRecord),
    /// (duplicate, original)
    Duplicate(FileRecord, FileRecord),
    /// The new file itself could not be hashed.
    Unreadable(HashError),
}

/// Borrowed hashing resources for one comparison.
struct HashContext<'a> {
    hasher: &'a Hasher,
    pool: Option<&'a rayon::ThreadPool>,
    window: u64,
}

impl HashContext<'_> {
    /// Digest used for the prefix stage: the whole file when it fits the window.
    fn stage_one(&self, path: &Path, size: u64) -> Result<Hash, HashError> {
        if size <= self.window {
            self.hasher.full_digest(path)
        } else {
            self.hasher.prefix_digest(path, self.window)
        }
    }

    /// Run the new file's digest alongside candidate backfills.
    fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        match self.pool {
            Some(pool) => pool.install(|| rayon::join(a, b)),
            None => (a(), b()),
        }
    }

    /// Hash `jobs` (index, path) with `digest`, classifying failures.
    fn backfill<F>(&self, jobs: &[(usize, PathBuf)], digest: F) -> Vec<Backfill>
    where
        F: Fn(&Path) -> Result<Hash, HashError> + Sync,
    {
        let run = |(idx, path): &(usize, PathBuf)| match digest(path) {
            Ok(hash) => Backfill::Done(*idx, hash),
            Err(e) if e.is_not_found() => {
                log::warn!("Candidate vanished, dropping it: {}", path.display());
                Backfill::Stale(*idx)
            }
            Err(e) => {
                log::warn!("Cannot hash candidate {}: {}", path.display(), e);
                Backfill::Failed(*idx)
            }
        };
        if self.pool.is_some() && jobs.len() > 1 {
            jobs.par_iter().map(run).collect()
        } else {
            jobs.iter().map(run).collect()
        }
    }
}

/// Prefix and full comparison for a file whose key already has a group.
fn compare_against_group(
    ctx: &HashContext<'_>,
    group: &mut CandidateGroup,
    entry: &FileEntry,
    stats: &mut ResolverStats,
) -> Comparison {
    let size = entry.size;
    let small = size <= ctx.window;
    let mut record = FileRecord::from_entry(entry);

    // Stage 2: prefix digests, backfilling candidates seen only once so far
    let prefix_jobs: Vec<(usize, PathBuf)> = group
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.prefix_digest.is_computed())
        .map(|(i, r)| (i, r.path.clone()))
        .collect();

    let (own, backfills) = ctx.join(
        || ctx.stage_one(&entry.path, size),
        || ctx.backfill(&prefix_jobs, |p| ctx.stage_one(p, size)),
    );

    let stale = apply_backfills(group, backfills, small, true, stats);
    if !stale.is_empty() {
        stats.stale_removed += group.remove_stale(&stale).len();
    }
    let own = match own {
        Ok(hash) => hash,
        Err(e) => return Comparison::Unreadable(e),
    };
    if small {
        record.set_whole_content_digest(own);
    } else {
        record.prefix_digest = DigestState::Computed(own);
    }

    let matching: Vec<usize> = group
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| r.prefix_digest.matches(&own))
        .map(|(i, _)| i)
        .collect();

    if matching.is_empty() {
        log::trace!("Unique by prefix: {}", entry.path.display());
        return Comparison::Unique(record);
    }

    // Stage 3: full digests for everything sharing the prefix
    if !small {
        let full_jobs: Vec<(usize, PathBuf)> = matching
            .iter()
            .filter(|&&i| !group.records()[i].full_digest.is_computed())
            .map(|&i| (i, group.records()[i].path.clone()))
            .collect();

        let (own_full, backfills) = ctx.join(
            || ctx.hasher.full_digest(&entry.path),
            || ctx.backfill(&full_jobs, |p| ctx.hasher.full_digest(p)),
        );

        let stale = apply_backfills(group, backfills, false, false, stats);
        if !stale.is_empty() {
            stats.stale_removed += group.remove_stale(&stale).len();
        }
        let own_full = match own_full {
            Ok(hash) => hash,
            Err(e) => return Comparison::Unreadable(e),
        };
        record.full_digest = DigestState::Computed(own_full);
    }

    let Some(full) = record.full_digest.get().copied() else {
        return Comparison::Unique(record);
    };

    if let Some(original) = group
        .records()
        .iter()
        .find(|r| r.full_digest.matches(&full))
    {
        return Comparison::Duplicate(record, original.clone());
    }

    log::trace!(
        "Prefix collision without full match: {} [{}]",
        entry.path.display(),
        hash_to_hex(&full)
    );
    Comparison::Unique(record)
}

/// Store backfilled digests; return positions of stale candidates.
fn apply_backfills(
    group: &mut CandidateGroup,
    backfills: Vec<Backfill>,
    small: bool,
    prefix_stage: bool,
    stats: &mut ResolverStats,
) -> Vec<usize> {
    let mut stale = Vec::new();
    for backfill in backfills {
        match backfill {
            Backfill::Done(idx, hash) => {
                let record = &mut group.records_mut()[idx];
                if small {
                    record.set_whole_content_digest(hash);
                } else if prefix_stage {
                    record.prefix_digest = DigestState::Computed(hash);
                } else {
                    record.full_digest = DigestState::Computed(hash);
                }
            }
            Backfill::Stale(idx) => stale.push(idx),
            Backfill::Failed(_) => stats.incomplete_comparisons += 1,
        }
    }
    stale
}

// ============================================================================
// DuplicateFinder - Run Orchestrator
// ============================================================================

/// Configuration for a complete run.
#[derive(Clone, Default)]
pub struct FinderConfig {
    /// Resolver settings.
    pub resolver: ResolverConfig,
    /// Walker settings shared by every root.
    pub walker_config: WalkerConfig,
    /// Remove directories left empty after the run (delete/relocate only).
    pub prune_empty_dirs: bool,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("resolver", &self.resolver)
            .field("walker_config", &self.walker_config)
            .field("prune_empty_dirs", &self.prune_empty_dirs)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl FinderConfig {
    /// Set the resolver configuration.
    #[must_use]
    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Remove empty directories after the run.
    #[must_use]
    pub fn with_prune_empty_dirs(mut self, prune: bool) -> Self {
        self.prune_empty_dirs = prune;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Summary of a complete run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Canonical roots that were scanned
    pub roots: Vec<PathBuf>,
    /// Files yielded by the walker
    pub files_seen: usize,
    /// Files below the minimum size or seen twice
    pub excluded: usize,
    /// Files kept as unique
    pub unique: usize,
    /// Confirmed duplicates
    pub duplicates: usize,
    /// Bytes held by confirmed duplicates
    pub duplicate_bytes: u64,
    /// Files skipped because they could not be hashed
    pub skipped: usize,
    /// Candidates dropped because their file disappeared
    pub stale_removed: usize,
    /// Comparisons abandoned because a candidate could not be hashed
    pub incomplete_comparisons: usize,
    /// Prefix digests computed
    pub prefix_digests: u64,
    /// Full digests computed
    pub full_digests: u64,
    /// Bytes read while hashing
    pub bytes_hashed: u64,
    /// Results of the executor
    pub actions: ExecutorStats,
    /// Empty directories removed afterwards
    pub dirs_pruned: usize,
    /// Traversal errors (unreadable directories and similar)
    pub scan_errors: Vec<ScanError>,
    /// Whether the run stopped early on a shutdown request
    pub interrupted: bool,
    /// Wall time of the run
    pub duration: Duration,
}

impl RunSummary {
    fn absorb(&mut self, stats: &ResolverStats, hasher: &Hasher) {
        self.files_seen = stats.files_seen;
        self.excluded = stats.excluded;
        self.unique = stats.unique;
        self.duplicates = stats.duplicates;
        self.duplicate_bytes = stats.duplicate_bytes;
        self.skipped = stats.skipped;
        self.stale_removed = stats.stale_removed;
        self.incomplete_comparisons = stats.incomplete_comparisons;
        self.prefix_digests = hasher.prefix_calls();
        self.full_digests = hasher.full_calls();
        self.bytes_hashed = hasher.bytes_read();
    }

    /// Whether any file or directory had to be skipped.
    #[must_use]
    pub fn had_errors(&self) -> bool {
        self.skipped > 0 || !self.scan_errors.is_empty() || self.actions.failures > 0
    }

    /// Duplicate volume as a human-readable string.
    #[must_use]
    pub fn duplicate_bytes_display(&self) -> String {
        bytesize::ByteSize::b(self.duplicate_bytes).to_string()
    }
}

/// Errors that abort a run before anything is touched.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// No roots were given.
    #[error("No directories to scan")]
    NoRoots,

    /// A root could not be resolved to an absolute path.
    #[error("I/O error for {path}: {source}")]
    IoWithPath {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Validate and canonicalize roots, dropping nested ones.
///
/// # Errors
///
/// Returns [`FinderError`] if any root is missing or not a directory.
pub fn prepare_roots(roots: &[PathBuf]) -> Result<Vec<PathBuf>, FinderError> {
    if roots.is_empty() {
        return Err(FinderError::NoRoots);
    }

    let mut canonical = Vec::with_capacity(roots.len());
    for root in roots {
        if !root.exists() {
            return Err(FinderError::PathNotFound(root.clone()));
        }
        if !root.is_dir() {
            return Err(FinderError::NotADirectory(root.clone()));
        }
        let path = root.canonicalize().map_err(|source| FinderError::IoWithPath {
            path: root.clone(),
            source,
        })?;
        canonical.push(path);
    }

    Ok(non_overlapping_roots(canonical))
}

/// Walks roots, resolves duplicates and dispatches them to an executor.
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Arc<Hasher>,
}

impl DuplicateFinder {
    /// Create a new finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        Self {
            config,
            hasher: Arc::new(Hasher::new()),
        }
    }

    /// Create a finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// Run one dedup pass over `roots`.
    ///
    /// Every root is validated before any file is read. A fresh index is
    /// built for each call, so repeated runs are independent.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] if a root does not exist or is not a
    /// directory. Per-file problems are logged and counted in the summary.
    pub fn run(
        &self,
        roots: &[PathBuf],
        executor: &mut ActionExecutor,
    ) -> Result<RunSummary, FinderError> {
        let start_time = Instant::now();
        let roots = prepare_roots(roots)?;
        let mut summary = RunSummary {
            roots: roots.clone(),
            ..Default::default()
        };

        let mut walker_config = self.config.walker_config.clone();
        if let Some(store) = executor.store_dir() {
            walker_config.exclude_dirs.push(store.to_path_buf());
        }
        let mut resolver =
            DuplicateResolver::with_hasher(self.config.resolver.clone(), self.hasher.clone());

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("scan", 0);
        }

        // One tracker for all roots: an inode reached twice is one file
        let mut tracker = HardlinkTracker::new();

        'roots: for root in &roots {
            log::info!("Scanning {}", root.display());
            let mut walker = Walker::new(root, walker_config.clone());
            if let Some(ref flag) = self.config.shutdown_flag {
                walker = walker.with_shutdown_flag(flag.clone());
            }

            for result in walker.walk_with_tracker(&mut tracker) {
                if self.config.is_shutdown_requested() {
                    summary.interrupted = true;
                    break 'roots;
                }
                let entry = match result {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::warn!("{}", e);
                        summary.scan_errors.push(e);
                        continue;
                    }
                };

                if let Some(ref callback) = self.config.progress_callback {
                    callback.on_progress(
                        resolver.stats().files_seen + 1,
                        entry.path.to_string_lossy().as_ref(),
                    );
                }

                if let Ok(Disposition::DuplicateOf {
                    duplicate,
                    original,
                }) = resolver.observe(&entry)
                {
                    if let Err(e) = executor.dispose(&duplicate, &original) {
                        log::error!("Action failed for {}: {}", duplicate.path.display(), e);
                    }
                }
            }
        }

        if self.config.is_shutdown_requested() {
            summary.interrupted = true;
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("scan");
        }

        if self.config.prune_empty_dirs && executor.mutates() && !summary.interrupted {
            let exclude: Vec<PathBuf> = executor.store_dir().map(Path::to_path_buf).into_iter().collect();
            for root in &roots {
                summary.dirs_pruned += prune_empty_dirs(root, &exclude);
            }
        }

        summary.absorb(resolver.stats(), resolver.hasher());
        summary.actions = executor.stats().clone();
        summary.duration = start_time.elapsed();

        log::info!(
            "Run complete: {} files, {} duplicates ({}), {} skipped, {} prefix / {} full digests",
            summary.files_seen,
            summary.duplicates,
            summary.duplicate_bytes_display(),
            summary.skipped,
            summary.prefix_digests,
            summary.full_digests
        );

        Ok(summary)
    }
}
