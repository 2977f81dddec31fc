//! Logger installation for the binary
//!
//! The library itself only uses the `log` facade.

use crate::config::LoggingConfig;
use crate::error::Result;
use std::fs::OpenOptions;

/// Install `env_logger` with the configured level as default filter
///
/// `RUST_LOG` still takes precedence. When `logging.file` is set, lines are
/// appended to that file instead of stderr.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.level.as_str()),
    );

    if let Some(path) = &config.file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    // A logger may already be installed, e.g. by a test harness
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
    Ok(())
}
