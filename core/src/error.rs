use thiserror::Error;

/// Error type produced by driver implementations.
///
/// Drivers report failures as boxed errors; the cache layer decides which
/// [`Error`] variant they belong to based on the phase that failed.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// Failure opening or using the underlying connection
    #[error("Connection error: {0}")]
    Connection(#[source] DriverError),

    /// The driver rejected a query while preparing it
    #[error("Prepare error for `{query}`: {source}")]
    Prepare {
        query: String,
        #[source]
        source: DriverError,
    },

    /// Re-binding a prepared statement into a transaction failed
    #[error("Bind error for `{query}`: {source}")]
    Bind {
        query: String,
        #[source]
        source: DriverError,
    },

    /// Error starting, committing or rolling back a transaction
    #[error("Transaction error: {0}")]
    Transaction(#[source] DriverError),

    /// Error executing an already resolved statement
    #[error("{0}")]
    Execution(#[source] DriverError),

    /// No rows returned when at least one was expected
    #[error("No rows in result set")]
    NoRows,

    /// A named placeholder had no matching argument
    #[error("Missing named argument `{0}`")]
    MissingNamedArg(String),

    /// Error mapping a value or row into a Rust type
    #[error("Decode error: {0}")]
    Decode(String),

    /// The operation's context was canceled
    #[error("Context canceled")]
    Canceled,

    /// The operation's context deadline passed
    #[error("Context deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// Returns `true` if the error happened while resolving a cacheable
    /// statement handle rather than while executing one.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, Error::Prepare { .. } | Error::Bind { .. })
    }

    /// Returns `true` for [`Error::Canceled`] and [`Error::DeadlineExceeded`].
    pub fn is_context_error(&self) -> bool {
        matches!(self, Error::Canceled | Error::DeadlineExceeded)
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;
