//! SQLite driver for stmtcache
//!
//! This crate implements the [`stmtcache_core::Connection`] contract on top of
//! [`rusqlite`], with a small connection pool so that a single
//! [`SqliteConnection`] can be shared by many threads.

pub mod connection;
pub mod error;
pub mod options;
mod pool;
pub mod statement;
pub mod transaction;
mod values;

pub use connection::SqliteConnection;
pub use error::SqliteError;
pub use options::{OpenMode, SqliteOptions, SqliteTransactionType};
pub use statement::{SqliteStatement, SqliteTxStatement};
pub use transaction::SqliteTransaction;

pub use rusqlite;
