//! Configuration snapshot for the server and its managed databases
//!
//! Loaded once at startup from TOML. Every section falls back to defaults, so
//! an empty file (or no file at all) yields a runnable configuration with the
//! database registry switched off.

use crate::database::driver::{sanitize_url, ConnectionSettings};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file looked up by [`AppConfig::load`]
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub dbserver: DbServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter, e.g. `info` or `dbserver=debug,sqlx=warn`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append log lines to this file instead of stderr
    #[serde(default)]
    pub file: Option<String>,
}

/// The `[dbserver]` section: which databases the registry manages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbServerConfig {
    /// Master switch; when off the registry is left empty
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between reconcile passes; `<= 0` disables the background loop
    #[serde(default = "default_conn_check_interval")]
    pub conn_check_interval: i64,

    /// Seconds allowed for one open + ping attempt
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Log the elapsed time of every query and exec
    #[serde(default)]
    pub log_statement_timing: bool,

    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

/// One `[[dbserver.databases]]` item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Logical name used by callers
    pub name: String,

    /// Driver identifier (`sqlite`, `mysql`, `postgres`, ...)
    pub driver: String,

    /// Driver-specific connection string
    pub url: String,

    #[serde(default = "default_max_idle")]
    pub max_idle: u32,

    /// 0 means the pool default
    #[serde(default)]
    pub max_open: u32,
}

fn default_server_enabled() -> bool {
    true
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8888
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_conn_check_interval() -> i64 {
    5
}
fn default_connect_timeout() -> u64 {
    3
}
fn default_max_idle() -> u32 {
    2
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for DbServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            conn_check_interval: default_conn_check_interval(),
            connect_timeout: default_connect_timeout(),
            log_statement_timing: false,
            databases: Vec::new(),
        }
    }
}

impl DbServerConfig {
    /// Period of the background reconcile loop, `None` when disabled
    pub fn check_interval(&self) -> Option<Duration> {
        if self.conn_check_interval > 0 {
            Some(Duration::from_secs(self.conn_check_interval as u64))
        } else {
            None
        }
    }

    /// Per-attempt connect timeout; 0 falls back to the default
    pub fn connect_timeout(&self) -> Duration {
        if self.connect_timeout == 0 {
            Duration::from_secs(default_connect_timeout())
        } else {
            Duration::from_secs(self.connect_timeout)
        }
    }

    /// Add a database item
    pub fn with_database(mut self, database: DatabaseConfig) -> Self {
        self.databases.push(database);
        self
    }
}

impl DatabaseConfig {
    /// Start building a database item
    pub fn builder(name: impl Into<String>) -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::new(name)
    }

    /// Connection settings recorded by the registry for this item
    pub fn settings(&self) -> ConnectionSettings {
        ConnectionSettings::new(&self.driver, &self.url, self.max_idle, self.max_open)
    }
}

/// Builder for DatabaseConfig
pub struct DatabaseConfigBuilder {
    name: String,
    driver: Option<String>,
    url: Option<String>,
    max_idle: u32,
    max_open: u32,
}

impl DatabaseConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: None,
            url: None,
            max_idle: default_max_idle(),
            max_open: 0,
        }
    }

    /// Set the driver identifier (required)
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Set the connection string (required)
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn max_idle(mut self, max_idle: u32) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn max_open(mut self, max_open: u32) -> Self {
        self.max_open = max_open;
        self
    }

    /// Build the item
    ///
    /// # Returns
    /// * `Ok(DatabaseConfig)` - If driver and url are set
    /// * `Err(Error)` - If either is missing
    pub fn build(self) -> Result<DatabaseConfig> {
        let driver = self.driver.ok_or_else(|| {
            Error::config(format!("Database '{}' is missing a driver", self.name))
        })?;
        let url = self
            .url
            .ok_or_else(|| Error::config(format!("Database '{}' is missing a url", self.name)))?;

        Ok(DatabaseConfig {
            name: self.name,
            driver,
            url,
            max_idle: self.max_idle,
            max_open: self.max_open,
        })
    }
}

impl AppConfig {
    /// Load `config.toml` from the working directory, or defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_with_base_dir(".")
    }

    /// Load `config.toml` from a specific base directory, or defaults if absent
    pub fn load_with_base_dir<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let path = base_dir.as_ref().join(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::from_file(&path)
        } else {
            log::debug!(
                "No configuration file at {}, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let content = fs::read_to_string(path_ref).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}. Make sure the file exists and is readable.",
                path_ref.display(),
                e
            ))
        })?;

        let config = Self::from_toml_str(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse config file '{}': {}",
                path_ref.display(),
                e
            ))
        })?;

        log::debug!(
            "Successfully loaded configuration from: {}",
            path_ref.display()
        );
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Check TOML syntax: {}", e)))
    }

    /// The full startup sequence: file (explicit path or `config.toml`),
    /// environment overrides, then validation
    pub fn resolve<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::load()?,
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DBSERVER_*` environment variables on top of the loaded values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = env::var("DBSERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("DBSERVER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::config("Invalid DBSERVER_PORT value"))?;
        }
        if let Ok(level) = env::var("DBSERVER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(interval) = env::var("DBSERVER_CONN_CHECK_INTERVAL") {
            self.dbserver.conn_check_interval = interval
                .parse()
                .map_err(|_| Error::config("Invalid DBSERVER_CONN_CHECK_INTERVAL value"))?;
        }
        Ok(())
    }

    /// Check the configuration for values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.enabled && self.server.port == 0 {
            return Err(Error::config("Server port cannot be 0"));
        }

        let mut seen = HashSet::new();
        for db in &self.dbserver.databases {
            if db.name.trim().is_empty() {
                return Err(Error::config("Database name cannot be empty"));
            }
            if !seen.insert(db.name.as_str()) {
                return Err(Error::config(format!(
                    "Database '{}' is configured more than once",
                    db.name
                )));
            }
            if db.driver.trim().is_empty() {
                return Err(Error::config(format!(
                    "Database '{}' has an empty driver",
                    db.name
                )));
            }
            if db.url.trim().is_empty() {
                return Err(Error::config(format!(
                    "Database '{}' has an empty url",
                    db.name
                )));
            }
            if db.max_open > 0 && db.max_idle > db.max_open {
                log::warn!(
                    "Database '{}': max_idle ({}) exceeds max_open ({})",
                    db.name,
                    db.max_idle,
                    db.max_open
                );
            }
        }

        Ok(())
    }

    /// Pretty JSON of the whole configuration with database passwords masked
    pub fn to_json_masked(&self) -> Result<String> {
        let mut masked = self.clone();
        for db in &mut masked.dbserver.databases {
            db.url = sanitize_url(&db.url);
        }
        Ok(serde_json::to_string_pretty(&masked)?)
    }
}
