use stmtcache_core::IsolationLevel;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteError {
    /// Rusqlite specific errors
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),

    /// A data source string option could not be understood
    #[error("Invalid option `{key}`: {reason}")]
    InvalidOption { key: String, reason: String },

    /// SQLite transactions are always serializable
    #[error("Unsupported isolation level: {}", .0.as_sql())]
    UnsupportedIsolation(IsolationLevel),
}

impl SqliteError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        SqliteError::InvalidOption {
            key: key.to_owned(),
            reason: reason.into(),
        }
    }
}
