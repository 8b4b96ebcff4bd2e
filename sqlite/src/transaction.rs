use std::sync::Arc;

use parking_lot::Mutex;
use stmtcache_core::{Context, DriverError, ExecResult, Rows, Transaction, Value};

use crate::error::SqliteError;
use crate::pool::PooledConnection;
use crate::statement::{self, Interrupt, SqliteStatement, SqliteTxStatement};

/// A transaction holding one pooled connection until it finishes.
///
/// Dropping an unfinished transaction rolls it back.
pub struct SqliteTransaction {
    conn: Mutex<PooledConnection>,
    id: u64,
    read_only: bool,
    finished: bool,
}

impl std::fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("id", &self.id)
            .field("read_only", &self.read_only)
            .field("finished", &self.finished)
            .finish()
    }
}

impl SqliteTransaction {
    pub(crate) fn begin(
        ctx: &Context,
        mut conn: PooledConnection,
        id: u64,
        begin_sql: &str,
        read_only: bool,
    ) -> Result<Self, DriverError> {
        if read_only {
            conn.execute_batch("PRAGMA query_only = ON")
                .map_err(SqliteError::from)?;
        }
        let started = Interrupt::arm(&conn, ctx).and_then(|_interrupt| {
            conn.execute_batch(begin_sql)
                .map_err(|err| statement::interrupted(ctx, err))
        });
        if let Err(err) = started {
            release(&mut conn, read_only);
            return Err(err);
        }

        stmtcache_core::stmtcache_trace_tx!("begin", "sqlite.rusqlite");
        Ok(Self {
            conn: Mutex::new(conn),
            id,
            read_only,
            finished: false,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn finish(mut self, sql: &str) -> Result<(), SqliteError> {
        self.finished = true;
        let conn = self.conn.get_mut();
        let result = conn.execute_batch(sql);
        release(conn, self.read_only);
        Ok(result?)
    }
}

/// Puts a connection back the way the pool hands it out: outside any
/// transaction and writable. A connection that cannot be reset is discarded.
fn release(conn: &mut PooledConnection, read_only: bool) {
    let mut reset = Ok(());
    if !conn.is_autocommit() {
        reset = conn.execute_batch("ROLLBACK");
    }
    if read_only && reset.is_ok() {
        reset = conn.execute_batch("PRAGMA query_only = OFF");
    }
    if let Err(_err) = reset {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            error = %_err,
            "stmtcache.transaction connection reset failed, discarding it"
        );
        conn.discard();
    }
}

impl Transaction for SqliteTransaction {
    type PoolStatement = SqliteStatement;
    type Statement = SqliteTxStatement;

    fn bind(
        &self,
        ctx: &Context,
        stmt: &Arc<SqliteStatement>,
    ) -> Result<SqliteTxStatement, DriverError> {
        let conn = self.conn.lock();
        let _interrupt = Interrupt::arm(&conn, ctx)?;
        // warms this connection's statement cache and surfaces schema errors early
        conn.prepare_cached(stmt.sql())
            .map_err(|err| statement::interrupted(ctx, err))?;
        Ok(SqliteTxStatement::new(Arc::clone(stmt), self.id))
    }

    fn execute(
        &self,
        ctx: &Context,
        stmt: &SqliteTxStatement,
        params: &[Value],
    ) -> Result<ExecResult, DriverError> {
        let conn = self.conn.lock();
        statement::execute(&conn, ctx, stmt.statement(), params)
    }

    fn query(
        &self,
        ctx: &Context,
        stmt: &SqliteTxStatement,
        params: &[Value],
    ) -> Result<Rows, DriverError> {
        let conn = self.conn.lock();
        statement::query(&conn, ctx, stmt.statement(), params)
    }

    fn commit(self) -> Result<(), DriverError> {
        self.finish("COMMIT")?;
        stmtcache_core::stmtcache_trace_tx!("commit", "sqlite.rusqlite");
        Ok(())
    }

    fn rollback(self) -> Result<(), DriverError> {
        self.finish("ROLLBACK")?;
        stmtcache_core::stmtcache_trace_tx!("rollback", "sqlite.rusqlite");
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let conn = self.conn.get_mut();
        if let Err(_err) = conn.execute_batch("ROLLBACK") {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_err, "stmtcache.transaction rollback on drop failed");
        }
        release(conn, self.read_only);
    }
}
