//! Command-line interface for the dbserver binary
//!
//! - `--config <path>` - configuration file (defaults to `./config.toml` when present)
//! - `--check` - load and validate the configuration, then exit

use crate::error::{Error, Result};
use clap::{Arg, ArgAction, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// CLI arguments parsed from command line
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Path to configuration file
    pub config_file: Option<PathBuf>,
    /// Only validate the configuration
    pub check: bool,
}

impl CliArgs {
    fn command() -> Command {
        Command::new("dbserver")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Multi-database connection server")
            .arg(
                Arg::new("config")
                    .long("config")
                    .short('c')
                    .value_name("FILE")
                    .help("Configuration file path")
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                Arg::new("check")
                    .long("check")
                    .help("Validate the configuration and exit")
                    .action(ArgAction::SetTrue),
            )
    }

    /// Parse the process arguments
    ///
    /// `--help` and `--version` print and exit the process, as clap does.
    pub fn parse() -> Self {
        let matches = Self::command().get_matches();
        Self::from_matches(&matches)
    }

    /// Parse an explicit argument list, the first item being the program name
    pub fn parse_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args).map_err(|e| {
            Error::config(format!("Failed to parse command line arguments: {}", e))
        })?;
        Ok(Self::from_matches(&matches))
    }

    fn from_matches(matches: &clap::ArgMatches) -> Self {
        CliArgs {
            config_file: matches.get_one::<PathBuf>("config").cloned(),
            check: matches.get_flag("check"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_flag() {
        let args = CliArgs::parse_from(["dbserver", "--config", "/etc/dbserver.toml"]).unwrap();
        assert_eq!(args.config_file, Some(PathBuf::from("/etc/dbserver.toml")));
        assert!(!args.check);
    }

    #[test]
    fn test_parse_defaults() {
        let args = CliArgs::parse_from(["dbserver"]).unwrap();
        assert!(args.config_file.is_none());
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        assert!(CliArgs::parse_from(["dbserver", "--bogus"]).is_err());
    }
}
