//! Layered configuration.
//!
//! Values are merged with `figment`, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config FILE`, or `config.toml` in the platform config dir)
//! 3. `DUPESTASH_*` environment variables (`DUPESTASH_MIN_SIZE=4096`)
//! 4. Command-line flags
//!
//! Sizes may be given as plain byte counts or with a unit (`"1MiB"`).
//!
//! ```toml
//! min_size = "4KiB"
//! ignore_name = false
//! io_threads = 2
//! ignore_patterns = ["*.tmp", "node_modules/"]
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize};

use crate::cli::parse_size;
use crate::duplicates::ResolverConfig;
use crate::scanner::{WalkerConfig, DEFAULT_PREFIX_WINDOW};

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "DUPESTASH_";

/// Errors building the configuration. All are fatal and happen before any
/// filesystem work.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    /// A layer could not be parsed or has the wrong type.
    #[error("invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("invalid value for {field}: {message}")]
    Invalid {
        /// Offending key
        field: &'static str,
        /// What is wrong
        message: String,
    },
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delete duplicates instead of reporting them.
    pub delete: bool,
    /// When deleting, move to the system trash instead of removing.
    pub trash: bool,
    /// Files smaller than this many bytes are ignored.
    #[serde(deserialize_with = "size_value")]
    pub min_size: u64,
    /// Group by size alone; `false` groups by (name, size).
    pub ignore_name: bool,
    /// Log the key and path of every file examined.
    pub verbose: bool,
    /// Bytes covered by the prefix digest.
    #[serde(deserialize_with = "size_value")]
    pub prefix_window: u64,
    /// Hashing threads.
    pub io_threads: usize,
    /// Follow symbolic links while walking.
    pub follow_symlinks: bool,
    /// Skip dot-files and dot-directories.
    pub skip_hidden: bool,
    /// Gitignore-style patterns to skip.
    pub ignore_patterns: Vec<String>,
    /// Remove directories emptied by delete or relocate.
    pub prune_empty_dirs: bool,
    /// Append-only action journal, written before every delete or relocate.
    /// Defaults to `journal.jsonl` in the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delete: false,
            trash: false,
            min_size: 1,
            ignore_name: true,
            verbose: false,
            prefix_window: DEFAULT_PREFIX_WINDOW,
            io_threads: 4,
            follow_symlinks: false,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
            prune_empty_dirs: false,
            journal: Self::default_journal_path(),
        }
    }
}

/// Values set on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    /// `--delete`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<bool>,
    /// `--trash`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trash: Option<bool>,
    /// `--min-size`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    /// `--match-name` (sets this to false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_name: Option<bool>,
    /// `--trace-files`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
    /// `--prefix-window`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_window: Option<u64>,
    /// `--io-threads`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_threads: Option<usize>,
    /// `--follow-symlinks`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_symlinks: Option<bool>,
    /// `--skip-hidden`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_hidden: Option<bool>,
    /// `--ignore`, replacing configured patterns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_patterns: Option<Vec<String>>,
    /// `--prune-empty-dirs`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prune_empty_dirs: Option<bool>,
    /// `--journal`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<PathBuf>,
}

impl Config {
    /// Default config file location, if the platform has one.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dupestash").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Default journal location, if the platform has a data directory.
    #[must_use]
    pub fn default_journal_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dupestash").map(|dirs| dirs.data_dir().join("journal.jsonl"))
    }

    /// The merged provider stack without CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] if `config_file` is given but
    /// missing. A missing default config file is not an error.
    pub fn figment(config_file: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match config_file {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound(path.to_path_buf()));
                }
                log::debug!("Loading config from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = Self::default_path().filter(|p| p.is_file()) {
                    log::debug!("Loading config from {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Build the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a layer is malformed or a value is
    /// out of range.
    pub fn load(
        config_file: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let config: Config = Self::figment(config_file)?
            .merge(Serialized::defaults(overrides))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no run can work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix_window == 0 {
            return Err(ConfigError::Invalid {
                field: "prefix_window",
                message: "must be at least 1 byte".to_string(),
            });
        }
        if self.io_threads == 0 {
            return Err(ConfigError::Invalid {
                field: "io_threads",
                message: "must be at least 1".to_string(),
            });
        }
        if self.trash && !self.delete {
            log::warn!("trash is set without delete; nothing will be removed");
        }
        Ok(())
    }

    /// Settings for the resolver.
    #[must_use]
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default()
            .with_min_size(self.min_size)
            .with_ignore_name(self.ignore_name)
            .with_verbose(self.verbose)
            .with_prefix_window(self.prefix_window)
            .with_io_threads(self.io_threads)
    }

    /// Settings for the walker.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            skip_hidden: self.skip_hidden,
            ignore_patterns: self.ignore_patterns.clone(),
            exclude_dirs: Vec::new(),
        }
    }
}

/// Accept either a byte count or a size string such as `"4KiB"`.
fn size_value<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeValue {
        Bytes(u64),
        Text(String),
    }

    match SizeValue::deserialize(deserializer)? {
        SizeValue::Bytes(n) => Ok(n),
        SizeValue::Text(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(figment: Figment) -> Config {
        figment.extract().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = extract(Figment::from(Serialized::defaults(Config::default())));
        assert_eq!(config, Config::default());
        assert_eq!(config.min_size, 1);
        assert!(config.ignore_name);
        assert_eq!(config.prefix_window, 1024 * 1024);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = ConfigOverrides {
            min_size: Some(10),
            ignore_name: Some(false),
            ..Default::default()
        };
        let config = extract(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Serialized::defaults(&overrides)),
        );
        assert_eq!(config.min_size, 10);
        assert!(!config.ignore_name);
        assert_eq!(config.io_threads, 4);
    }

    #[test]
    fn test_size_strings() {
        let config = extract(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::string("min_size = \"4KiB\"\nprefix_window = 512")),
        );
        assert_eq!(config.min_size, 4096);
        assert_eq!(config.prefix_window, 512);
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = Config {
            prefix_window: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "prefix_window",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let config = Config {
            io_threads: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = Config::figment(Some(Path::new("/no/such/dupestash.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_resolver_and_walker_configs() {
        let config = Config {
            min_size: 0,
            ignore_name: false,
            io_threads: 2,
            skip_hidden: true,
            ..Config::default()
        };
        let resolver = config.resolver_config();
        assert_eq!(resolver.min_size, 0);
        assert!(!resolver.ignore_name);
        assert_eq!(resolver.io_threads, 2);

        let walker = config.walker_config();
        assert!(walker.skip_hidden);
    }
}
