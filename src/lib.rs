//! # stmtcache
//!
//! A concurrency-safe prepared statement cache for SQL database clients.
//!
//! [`StatementCache`] sits in front of a driver [`Connection`] and prepares each
//! distinct query text at most once, however many threads ask for it.
//! [`TransactionScope`] offers the same operations inside a transaction and
//! derives its statements from the cache's, binding them into the transaction
//! instead of preparing them again.
//!
//! ## Quick Start
//!
//! ```rust
//! use stmtcache::{Value, params};
//!
//! # fn main() -> stmtcache::Result<()> {
//! let cache = stmtcache::open("sqlite", ":memory:")?;
//! cache.exec("CREATE TABLE test_object (id INTEGER PRIMARY KEY)", &[])?;
//! cache.exec("INSERT INTO test_object (id) VALUES ($1)", &params![0])?;
//!
//! let id: i64 = cache.get("SELECT id FROM test_object WHERE id = $1", &params![0])?;
//! assert_eq!(id, 0);
//!
//! let tx = cache.begin()?;
//! tx.named_exec("INSERT INTO test_object (id) VALUES (:id)", &[("id", Value::from(1))])?;
//! tx.rollback()?;
//!
//! let missing = cache.get::<i64>("SELECT id FROM test_object WHERE id = $1", &params![1]);
//! assert!(matches!(missing, Err(stmtcache::Error::NoRows)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Drivers
//!
//! | Database | Driver   | Feature Flag | Driver names                   |
//! |----------|----------|--------------|--------------------------------|
//! | SQLite   | rusqlite | `sqlite`     | `sqlite`, `sqlite3`, `rusqlite` |
//!
//! Any other database can be used by implementing [`Connection`] and
//! [`Transaction`] for its client.

#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod macros;

mod cache;
mod ops;
mod statements;
mod transaction;

pub use cache::{CacheStats, StatementCache};
pub use transaction::{TransactionScope, TxStatement};

pub use stmtcache_core::{
    BoundArgs, CancelHandle, CompileError, CompiledQuery, Connection, Context, Dialect,
    DriverError, Error, ExecResult, FromRow, FromValue, IsolationLevel, NamedArgs,
    NamedStatement, Open, Result, Row, Rows, Transaction, TxOptions, Value, compile_named,
    params,
};

/// The SQLite driver.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub use stmtcache_sqlite as sqlite;

/// Opens a [`StatementCache`] over the SQLite driver.
///
/// `driver_name` must name SQLite (see [`Dialect::parse`]); `dsn` is parsed by
/// [`SqliteOptions::from_dsn`](stmtcache_sqlite::SqliteOptions::from_dsn).
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub fn open(driver_name: &str, dsn: &str) -> Result<StatementCache<sqlite::SqliteConnection>> {
    StatementCache::open(driver_name, dsn)
}

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        Context, Error, FromRow, NamedArgs, Result, StatementCache, TransactionScope, TxOptions,
        Value, params,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::sqlite::{SqliteConnection, SqliteOptions};
}
