//! Command-line interface definitions.
//!
//! ```bash
//! # Report duplicates under two trees
//! dupestash scan ~/Photos /mnt/backup/Photos
//!
//! # Delete duplicates, matching on file name as well as content
//! dupestash scan ~/Downloads --delete --match-name
//!
//! # Move duplicates into ~/Music/.dupestash, then put them back
//! dupestash relocate ~/Music
//! dupestash restore ~/Music
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::ConfigOverrides;

/// Staged duplicate file remover with a content-addressed stash.
///
/// Files are grouped by size, compared by a BLAKE3 digest of their first
/// bytes and only fully hashed when those match. The first copy found in
/// traversal order (directories sorted by name) is always the one kept.
#[derive(Debug, Parser)]
#[command(name = "dupestash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find duplicates and report or delete them
    Scan(ScanArgs),
    /// Move duplicates into a content-addressed store under ROOT
    Relocate(RelocateArgs),
    /// Put relocated files back and remove the store
    Restore(RestoreArgs),
}

/// Options shared by `scan` and `relocate`.
#[derive(Debug, Args, Default)]
pub struct FilterArgs {
    /// Ignore files smaller than SIZE (e.g. 4KiB, 1MB; default 1 byte)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Only compare files that also share a file name
    #[arg(long)]
    pub match_name: bool,

    /// Bytes hashed before deciding whether to hash a whole file (default 1MiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub prefix_window: Option<u64>,

    /// Threads used for hashing (default 4)
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Gitignore-style pattern to skip (repeatable)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Skip hidden files and directories
    #[arg(long)]
    pub skip_hidden: bool,

    /// Follow symbolic links
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Remove directories left empty afterwards
    #[arg(long)]
    pub prune_empty_dirs: bool,

    /// Log the grouping key and path of every file
    #[arg(long)]
    pub trace_files: bool,

    /// Journal file for delete/relocate actions (default: journal.jsonl in the data dir)
    #[arg(long, value_name = "FILE")]
    pub journal: Option<PathBuf>,
}

impl FilterArgs {
    /// Flags that were given, as configuration overrides.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            min_size: self.min_size,
            ignore_name: self.match_name.then_some(false),
            verbose: self.trace_files.then_some(true),
            prefix_window: self.prefix_window,
            io_threads: self.io_threads,
            follow_symlinks: self.follow_symlinks.then_some(true),
            skip_hidden: self.skip_hidden.then_some(true),
            ignore_patterns: (!self.ignore_patterns.is_empty())
                .then(|| self.ignore_patterns.clone()),
            prune_empty_dirs: self.prune_empty_dirs.then_some(true),
            journal: self.journal.clone(),
            ..ConfigOverrides::default()
        }
    }
}

/// Arguments for `scan`.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directories to scan
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Delete duplicates (permanently unless --trash)
    #[arg(long)]
    pub delete: bool,

    /// With --delete, move duplicates to the system trash
    #[arg(long, requires = "delete")]
    pub trash: bool,

    /// Output format for the summary
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(flatten)]
    pub filters: FilterArgs,
}

impl ScanArgs {
    /// Configuration overrides from the flags given.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            delete: self.delete.then_some(true),
            trash: self.trash.then_some(true),
            ..self.filters.overrides()
        }
    }
}

/// Arguments for `relocate`.
#[derive(Debug, Args)]
pub struct RelocateArgs {
    /// Directory to deduplicate; the store is created inside it
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Output format for the summary
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(flatten)]
    pub filters: FilterArgs,
}

/// Arguments for `restore`.
#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Directory previously passed to `relocate`
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,
}

/// Summary output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per duplicate plus a summary
    Text,
    /// A single JSON document on stdout
    Json,
    /// `hash,size,path` rows for every file in a duplicate set
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupestash::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, not a number, negative, or has
/// an unknown suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    if let Ok(whole) = num_str.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| format!("Size too large: '{s}'"));
    }

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;
    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1024B").unwrap(), 1024);
        assert_eq!(parse_size("1kib").unwrap(), 1_024);
        assert_eq!(parse_size("10MB").unwrap(), 10_000_000);
        assert_eq!(parse_size("1GiB").unwrap(), 1_073_741_824);
        assert_eq!(parse_size("1TiB").unwrap(), 1_099_511_627_776);
    }

    #[test]
    fn test_parse_size_fractional_and_spaces() {
        assert_eq!(parse_size("1.5MB").unwrap(), 1_500_000);
        assert_eq!(parse_size(" 1 MB ").unwrap(), 1_000_000);
    }

    #[test]
    fn test_parse_size_errors() {
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("1XB").is_err());
        assert!(parse_size("-1MB").is_err());
        assert!(parse_size("99999999999TiB").is_err());
    }

    #[test]
    fn test_scan_defaults() {
        let cli = Cli::try_parse_from(["dupestash", "scan", "/a", "/b"]).unwrap();
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
                assert!(!args.delete);
                assert_eq!(args.output, OutputFormat::Text);
                let overrides = args.overrides();
                assert!(overrides.delete.is_none());
                assert!(overrides.ignore_name.is_none());
                assert!(overrides.min_size.is_none());
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_scan_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "dupestash",
            "scan",
            "/a",
            "--delete",
            "--trash",
            "--match-name",
            "--min-size",
            "4KiB",
            "--prefix-window",
            "64KiB",
            "--io-threads",
            "2",
            "--ignore",
            "*.tmp",
            "--journal",
            "actions.jsonl",
        ])
        .unwrap();

        let Commands::Scan(args) = cli.command else {
            panic!("Expected Scan command");
        };
        let overrides = args.overrides();
        assert_eq!(overrides.delete, Some(true));
        assert_eq!(overrides.trash, Some(true));
        assert_eq!(overrides.ignore_name, Some(false));
        assert_eq!(overrides.min_size, Some(4096));
        assert_eq!(overrides.prefix_window, Some(65_536));
        assert_eq!(overrides.io_threads, Some(2));
        assert_eq!(overrides.ignore_patterns, Some(vec!["*.tmp".to_string()]));
        assert_eq!(overrides.journal, Some(PathBuf::from("actions.jsonl")));
    }

    #[test]
    fn test_trash_requires_delete() {
        assert!(Cli::try_parse_from(["dupestash", "scan", "/a", "--trash"]).is_err());
    }

    #[test]
    fn test_scan_requires_path() {
        assert!(Cli::try_parse_from(["dupestash", "scan"]).is_err());
    }

    #[test]
    fn test_relocate_and_restore() {
        let cli = Cli::try_parse_from(["dupestash", "relocate", "/music", "--skip-hidden"]).unwrap();
        match cli.command {
            Commands::Relocate(args) => {
                assert_eq!(args.root, PathBuf::from("/music"));
                assert!(args.filters.skip_hidden);
            }
            _ => panic!("Expected Relocate command"),
        }

        let cli = Cli::try_parse_from(["dupestash", "restore", "/music"]).unwrap();
        assert!(matches!(cli.command, Commands::Restore(_)));
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "dupestash",
            "scan",
            "/a",
            "-vv",
            "--json-errors",
            "--config",
            "x.toml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json_errors);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["dupestash", "-v", "-q", "scan", "/a"]).is_err());
    }
}
