//! Core types for the stmtcache workspace.
//!
//! This crate defines the contract between the statement cache and database
//! drivers ([`Connection`], [`Transaction`], [`Open`]), the value and row types
//! that cross it, named-query compilation, [`Context`] cancellation and the
//! shared [`Error`] taxonomy.

pub mod context;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod named;
pub mod row;
pub mod tracing;
pub mod value;

// Re-export key types and traits
pub use context::{CancelHandle, Context};
pub use dialect::Dialect;
pub use driver::{Connection, IsolationLevel, Open, Transaction, TxOptions};
pub use error::{DriverError, Error, Result};
pub use named::{BoundArgs, CompileError, CompiledQuery, NamedArgs, NamedStatement, compile_named};
pub use row::{ExecResult, FromRow, Row, Rows};
pub use value::{FromValue, Value};
