use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dbserver
#[derive(Error, Debug)]
pub enum Error {
    // Registry errors surfaced to callers
    #[error("db({0}) not found")]
    NotFound(String),

    #[error("db({0}) not connected")]
    NotConnected(String),

    #[error("{0}")]
    Statement(String),

    // Connection errors, only ever logged by reconcile
    #[error("Unsupported database driver: {0}")]
    UnsupportedDriver(String),

    #[error("Database connection error: {0}")]
    DatabaseConnection(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    // Shell errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    pub fn not_connected(name: impl Into<String>) -> Self {
        Self::NotConnected(name.into())
    }

    pub fn statement(msg: impl Into<String>) -> Self {
        Self::Statement(msg.into())
    }

    pub fn unsupported_driver(driver: impl Into<String>) -> Self {
        Self::UnsupportedDriver(driver.into())
    }

    pub fn database_connection(msg: impl Into<String>) -> Self {
        Self::DatabaseConnection(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a later reconcile pass may turn this error into a success
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::NotConnected(_) | Error::DatabaseConnection(_) | Error::Timeout(_)
        )
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "E_DB_NOT_FOUND",
            Error::NotConnected(_) => "E_DB_NOT_CONNECTED",
            Error::Statement(_) => "E_DB_STATEMENT",
            Error::UnsupportedDriver(_) => "E_DB_DRIVER",
            Error::DatabaseConnection(_) => "E_DB_CONNECTION",
            Error::Timeout(_) => "E_TIMEOUT",
            Error::Config(_) => "E_CONFIG",
            Error::Http(_) => "E_HTTP",
            Error::Json(_) => "E_JSON",
            Error::Io(_) => "E_IO",
            Error::Internal(_) => "E_INTERNAL",
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::Statement(_) => 400,
            Error::NotConnected(_) | Error::DatabaseConnection(_) => 503,
            Error::Timeout(_) => 504,
            _ => 500,
        }
    }
}
