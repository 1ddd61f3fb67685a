//! File actions module.
//!
//! This module provides:
//! - The action executor applying report, delete or relocate to duplicates
//! - Deletion primitives (permanent or via the system trash)
//! - The content-addressed store and its restore operation
//! - The append-only action journal
//!
//! ```no_run
//! use dupestash::actions::{ActionExecutor, ActionMode, DeleteMethod};
//!
//! let executor = ActionExecutor::new(ActionMode::Delete(DeleteMethod::Trash));
//! assert!(executor.mutates());
//! ```

pub mod delete;
pub mod executor;
pub mod journal;
pub mod store;

pub use executor::{
    ActionError, ActionExecutor, ActionMode, DeleteMethod, DispositionResult, ExecutorStats,
    PairRecord,
};
pub use journal::{ActionJournal, JournalAction, JournalEntry, JournalPhase};
pub use store::{restore, ManifestEntry, RestoreSummary, StoreError, StoreLayout, STORE_DIR_NAME};
