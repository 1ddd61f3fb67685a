//! dupestash - staged duplicate file remover.
//!
//! Walks one or more directory trees, finds files with identical content
//! using a size → prefix digest → full digest pipeline, and reports,
//! deletes or relocates the later copies into a content-addressed store
//! that can be restored afterwards.
//!
//! The pieces can be used on their own:
//!
//! ```no_run
//! use dupestash::duplicates::{DuplicateResolver, ResolverConfig};
//! use dupestash::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let mut resolver = DuplicateResolver::new(ResolverConfig::default());
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! for entry in walker.walk().flatten() {
//!     if let Ok(disposition) = resolver.observe(&entry) {
//!         if disposition.is_duplicate() {
//!             println!("{}", entry.path.display());
//!         }
//!     }
//! }
//! ```

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::actions::{ActionExecutor, ActionJournal, ActionMode, DeleteMethod, StoreLayout};
use crate::cli::{Cli, Commands, OutputFormat};
use crate::config::{Config, ConfigOverrides};
use crate::duplicates::{prepare_roots, DuplicateFinder, FinderConfig, RunSummary};
use crate::error::ExitCode;
use crate::output::{write_restore_summary, write_run_summary, CsvOutput, JsonOutput};
use crate::progress::Progress;

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error for anything that stops the command before it starts:
/// invalid configuration, missing roots, an unopenable journal. Per-file
/// problems are reported through the exit code instead.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    if cli.no_color || !std::io::stdout().is_terminal() {
        yansi::disable();
    }

    match cli.command {
        Commands::Scan(ref args) => {
            let config = load_config(&cli, &args.overrides())?;
            let mode = if config.delete {
                ActionMode::Delete(if config.trash {
                    DeleteMethod::Trash
                } else {
                    DeleteMethod::Permanent
                })
            } else {
                ActionMode::Report
            };
            run_dedup(&args.paths, &config, mode, args.output, cli.quiet)
        }
        Commands::Relocate(ref args) => {
            let config = load_config(&cli, &args.filters.overrides())?;
            let root = prepare_roots(std::slice::from_ref(&args.root))?
                .into_iter()
                .next()
                .context("no root to relocate")?;
            let mode = ActionMode::Relocate(StoreLayout::new(&root));
            run_dedup(&[root], &config, mode, args.output, cli.quiet)
        }
        Commands::Restore(ref args) => {
            logging::init_logging(cli.verbose, cli.quiet);
            let root = args
                .root
                .canonicalize()
                .with_context(|| format!("cannot resolve {}", args.root.display()))?;
            let summary = actions::restore(&root)
                .with_context(|| format!("restore of {} failed", root.display()))?;
            if !cli.quiet {
                write_restore_summary(std::io::stdout().lock(), &summary)?;
            }
            Ok(if summary.is_complete() {
                ExitCode::Success
            } else {
                ExitCode::PartialSuccess
            })
        }
    }
}

/// Merge configuration layers, then start logging at the resulting level.
fn load_config(cli: &Cli, overrides: &ConfigOverrides) -> anyhow::Result<Config> {
    let config = Config::load(cli.config.as_deref(), overrides)
        .context("failed to load configuration")?;
    let verbosity = if config.verbose {
        cli.verbose.max(1)
    } else {
        cli.verbose
    };
    logging::init_logging(verbosity, cli.quiet);
    log::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn run_dedup(
    roots: &[PathBuf],
    config: &Config,
    mode: ActionMode,
    output: OutputFormat,
    quiet: bool,
) -> anyhow::Result<ExitCode> {
    let shutdown = signal::install_handler().unwrap_or_else(|e| {
        log::warn!("{}; Ctrl+C will stop immediately", e);
        signal::ShutdownHandler::new()
    });

    let mut executor = build_executor(config, mode)?;
    executor = match output {
        OutputFormat::Text if !quiet => executor.with_report_writer(Box::new(std::io::stdout())),
        OutputFormat::Text => executor,
        OutputFormat::Json | OutputFormat::Csv => executor.with_pair_log(),
    };

    let mut finder_config = FinderConfig::default()
        .with_resolver(config.resolver_config())
        .with_walker_config(config.walker_config())
        .with_prune_empty_dirs(config.prune_empty_dirs)
        .with_shutdown_flag(shutdown.get_flag());
    if !quiet && std::io::stderr().is_terminal() {
        finder_config = finder_config.with_progress_callback(Arc::new(Progress::new(false)));
    }

    let summary = DuplicateFinder::new(finder_config).run(roots, &mut executor)?;
    let exit_code = exit_code_for(&summary);

    match output {
        OutputFormat::Json => {
            JsonOutput::new(executor.pairs(), &summary, exit_code)
                .write_to(std::io::stdout().lock())
                .context("failed to write JSON output")?;
        }
        OutputFormat::Csv => {
            CsvOutput::new(executor.pairs())
                .write_to(std::io::stdout().lock())
                .context("failed to write CSV output")?;
        }
        OutputFormat::Text if !quiet => write_run_summary(std::io::stdout().lock(), &summary)?,
        OutputFormat::Text => {}
    }

    Ok(exit_code)
}

/// Executor for `mode`, journalling to the configured journal when it mutates.
///
/// Report runs never create a journal file.
///
/// # Errors
///
/// Returns an error if the journal cannot be opened.
pub fn build_executor(config: &Config, mode: ActionMode) -> anyhow::Result<ActionExecutor> {
    let journal_path = config.journal.as_ref().filter(|_| mode.mutates());
    let mut executor = ActionExecutor::new(mode);
    if let Some(path) = journal_path {
        let journal = ActionJournal::open(path)
            .with_context(|| format!("cannot open journal {}", path.display()))?;
        log::info!("Journalling actions to {}", path.display());
        executor = executor.with_journal(journal);
    }
    Ok(executor)
}

/// Exit code for a finished run.
#[must_use]
pub fn exit_code_for(summary: &RunSummary) -> ExitCode {
    if summary.interrupted {
        ExitCode::Interrupted
    } else if summary.had_errors() {
        ExitCode::PartialSuccess
    } else if summary.duplicates == 0 {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    }
}
