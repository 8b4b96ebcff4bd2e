//! The database driver contract the statement cache is layered on.
//!
//! A driver provides an open [`Connection`] (usually a pool) that can prepare
//! statements, run them and start [`Transaction`]s. The cache never looks inside
//! a statement handle: it only stores it, hands it back and passes it to the
//! driver's execution primitives.

use std::sync::Arc;

use crate::context::Context;
use crate::dialect::Dialect;
use crate::error::DriverError;
use crate::named::{NamedStatement, compile_named};
use crate::row::{ExecResult, Rows};
use crate::value::Value;

/// Transaction isolation levels a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options for starting a transaction.
///
/// `isolation: None` uses the driver's default level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TxOptions {
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// An open database handle able to prepare and run statements.
pub trait Connection: Send + Sync + Sized {
    /// Prepared statement handle bound to this connection
    type Statement: Send + Sync;

    /// Transaction started from this connection
    type Transaction: Transaction<PoolStatement = Self::Statement>;

    /// Placeholder syntax used when compiling named queries.
    fn dialect(&self) -> Dialect;

    fn prepare(&self, ctx: &Context, sql: &str) -> Result<Self::Statement, DriverError>;

    /// Prepares a query that uses `:name` placeholders.
    ///
    /// The default compiles the names into [`Connection::dialect`]'s positional
    /// syntax and prepares the result with [`Connection::prepare`].
    fn prepare_named(
        &self,
        ctx: &Context,
        sql: &str,
    ) -> Result<NamedStatement<Self::Statement>, DriverError> {
        let compiled = compile_named(sql, self.dialect())?;
        let statement = self.prepare(ctx, &compiled.sql)?;
        Ok(NamedStatement::new(statement, compiled.names))
    }

    fn begin(&self, ctx: &Context, opts: &TxOptions) -> Result<Self::Transaction, DriverError>;

    fn execute(
        &self,
        ctx: &Context,
        stmt: &Self::Statement,
        params: &[Value],
    ) -> Result<ExecResult, DriverError>;

    fn query(
        &self,
        ctx: &Context,
        stmt: &Self::Statement,
        params: &[Value],
    ) -> Result<Rows, DriverError>;

    /// Releases the connection. Statements prepared on it become unusable.
    fn close(self) -> Result<(), DriverError>;
}

/// An in-progress transaction.
///
/// Statements prepared on the owning connection are re-bound into the
/// transaction with [`Transaction::bind`] before they run inside it.
pub trait Transaction: Send + Sync {
    type PoolStatement;

    /// Statement handle bound to this transaction
    type Statement: Send + Sync;

    fn bind(
        &self,
        ctx: &Context,
        stmt: &Arc<Self::PoolStatement>,
    ) -> Result<Self::Statement, DriverError>;

    fn execute(
        &self,
        ctx: &Context,
        stmt: &Self::Statement,
        params: &[Value],
    ) -> Result<ExecResult, DriverError>;

    fn query(
        &self,
        ctx: &Context,
        stmt: &Self::Statement,
        params: &[Value],
    ) -> Result<Rows, DriverError>;

    fn commit(self) -> Result<(), DriverError>;

    fn rollback(self) -> Result<(), DriverError>;
}

/// Connections that can be opened from a driver name and data source string.
pub trait Open: Connection {
    /// Dialect spoken by this driver.
    const DIALECT: Dialect;

    /// Returns `true` if `driver_name` refers to this driver.
    fn accepts(driver_name: &str) -> bool {
        Dialect::parse(driver_name) == Some(Self::DIALECT)
    }

    fn open(dsn: &str) -> Result<Self, DriverError>;
}
