//! Logging setup.
//!
//! Uses the `log` facade with an `env_logger` backend writing to stderr.
//! The level comes from, in priority order:
//!
//! 1. `RUST_LOG` (if set)
//! 2. `--quiet` (errors only)
//! 3. `-v` count: warn by default, info, debug, then trace
//!
//! Dispositions and skips are logged at info and warn, so `-v` gives an
//! audit trail of every file touched.
//!
//! ```rust,no_run
//! use dupestash::logging::init_logging;
//!
//! init_logging(1, false);
//! log::info!("visible with -v");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initialize logging from CLI flags.
///
/// Returns `false` if a logger was already installed, which happens when
/// the library is driven from tests.
pub fn init_logging(verbose: u8, quiet: bool) -> bool {
    let from_env = env::var_os("RUST_LOG").is_some();
    let level = determine_level(verbose, quiet);

    let mut builder = Builder::new();
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level);
    }

    let detailed = verbose >= 2;
    builder.format(move |buf, record| {
        let style = buf.default_level_style(record.level());
        if detailed {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.module_path().unwrap_or("?"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{style}{:<5}{style:#} {}",
                record.level(),
                record.args()
            )
        }
    });

    let installed = builder.try_init().is_ok();
    if installed {
        if from_env {
            log::debug!("Log level taken from RUST_LOG");
        } else {
            log::debug!("Log level: {:?}", level);
        }
    }
    installed
}

/// Map `-v` / `-q` to a level filter.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_warn() {
        assert_eq!(determine_level(0, false), LevelFilter::Warn);
    }

    #[test]
    fn test_verbosity_steps() {
        assert_eq!(determine_level(1, false), LevelFilter::Info);
        assert_eq!(determine_level(2, false), LevelFilter::Debug);
        assert_eq!(determine_level(5, false), LevelFilter::Trace);
    }

    #[test]
    fn test_quiet_wins() {
        assert_eq!(determine_level(3, true), LevelFilter::Error);
    }
}
