//! Prepared statement handles and the execution helpers shared by the pool
//! and by transactions.
//!
//! rusqlite statements borrow their connection, so a handle records what the
//! statement is (SQL text, parameter count, result columns) and every run goes
//! through the executing connection's own `prepare_cached` cache. Every call
//! into SQLite runs under an [`Interrupt`] so a context can stop it midway.

use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, params_from_iter};
use stmtcache_core::{Context, DriverError, ExecResult, Row, Rows, Value};

use crate::pool::PooledConnection;
use crate::values::{SqlArg, from_value_ref};

/// Virtual machine instructions between two context checks inside SQLite.
const PROGRESS_OPS: i32 = 1000;

/// Ties SQLite work on one connection to a [`Context`].
///
/// While armed, a progress handler interrupts the running statement once the
/// context ends and the busy timeout is clamped to the context's deadline.
/// Both are restored on drop.
pub(crate) struct Interrupt<'c> {
    conn: &'c PooledConnection,
    armed: bool,
}

impl<'c> Interrupt<'c> {
    pub(crate) fn arm(conn: &'c PooledConnection, ctx: &Context) -> Result<Self, DriverError> {
        ctx.check()?;
        if ctx.is_background() {
            return Ok(Self { conn, armed: false });
        }

        let watched = ctx.clone();
        conn.progress_handler(PROGRESS_OPS, Some(move || watched.is_done()));
        let guard = Self { conn, armed: true };
        if let Some(left) = ctx.remaining() {
            // rounded up so a busy wait ends after the deadline, not just before it
            let left = Duration::from_millis(left.as_millis() as u64 + 1);
            conn.busy_timeout(left.min(conn.busy_timeout_setting()))?;
        }
        Ok(guard)
    }
}

impl Drop for Interrupt<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.conn.progress_handler(0, None::<fn() -> bool>);
        if let Err(_err) = self.conn.busy_timeout(self.conn.busy_timeout_setting()) {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_err, "stmtcache.sqlite busy timeout restore failed");
        }
    }
}

/// Reports the context's error in place of what SQLite returned once the
/// context has ended, so an interrupted step reads as a cancellation.
pub(crate) fn interrupted(ctx: &Context, err: rusqlite::Error) -> DriverError {
    match ctx.err() {
        Some(ended) => ended.into(),
        None => err.into(),
    }
}

/// A statement validated against the database.
#[derive(Debug)]
pub struct SqliteStatement {
    sql: Arc<str>,
    param_count: usize,
    columns: Arc<[String]>,
    readonly: bool,
}

impl SqliteStatement {
    pub(crate) fn prepare(conn: &Connection, sql: &str) -> rusqlite::Result<Self> {
        let stmt = conn.prepare_cached(sql)?;
        Ok(Self {
            sql: Arc::from(sql),
            param_count: stmt.parameter_count(),
            columns: stmt.column_names().into_iter().map(String::from).collect(),
            readonly: stmt.readonly(),
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Result column names, empty for statements that return no rows.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns `true` if the statement makes no direct changes to the database.
    pub fn readonly(&self) -> bool {
        self.readonly
    }
}

/// A pool statement bound to one transaction.
#[derive(Debug)]
pub struct SqliteTxStatement {
    statement: Arc<SqliteStatement>,
    transaction: u64,
}

impl SqliteTxStatement {
    pub(crate) fn new(statement: Arc<SqliteStatement>, transaction: u64) -> Self {
        Self {
            statement,
            transaction,
        }
    }

    /// The pool-level statement this handle was derived from.
    pub fn statement(&self) -> &Arc<SqliteStatement> {
        &self.statement
    }

    /// Id of the transaction the handle is bound to.
    pub fn transaction_id(&self) -> u64 {
        self.transaction
    }
}

pub(crate) fn execute(
    conn: &PooledConnection,
    ctx: &Context,
    stmt: &SqliteStatement,
    params: &[Value],
) -> Result<ExecResult, DriverError> {
    let _interrupt = Interrupt::arm(conn, ctx)?;
    run_execute(conn, stmt, params).map_err(|err| interrupted(ctx, err))
}

fn run_execute(
    conn: &Connection,
    stmt: &SqliteStatement,
    params: &[Value],
) -> rusqlite::Result<ExecResult> {
    let mut prepared = conn.prepare_cached(stmt.sql())?;
    let changed = prepared.execute(params_from_iter(params.iter().map(SqlArg)))?;
    Ok(ExecResult {
        rows_affected: changed as u64,
        last_insert_id: Some(conn.last_insert_rowid()),
    })
}

pub(crate) fn query(
    conn: &PooledConnection,
    ctx: &Context,
    stmt: &SqliteStatement,
    params: &[Value],
) -> Result<Rows, DriverError> {
    let _interrupt = Interrupt::arm(conn, ctx)?;
    run_query(conn, stmt, params).map_err(|err| interrupted(ctx, err))
}

fn run_query(
    conn: &Connection,
    stmt: &SqliteStatement,
    params: &[Value],
) -> rusqlite::Result<Rows> {
    let mut prepared = conn.prepare_cached(stmt.sql())?;
    let columns: Arc<[String]> = prepared
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = prepared.query(params_from_iter(params.iter().map(SqlArg)))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..columns.len())
            .map(|i| row.get_ref(i).map(from_value_ref))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        out.push(Row::new(columns.clone(), values));
    }
    Ok(Rows::new(columns, out))
}
