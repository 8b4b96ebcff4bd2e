//! Synchronous SQLite driver using [`rusqlite`].
//!
//! # Example
//!
//! ```no_run
//! use stmtcache_core::{Connection, Context, params};
//! use stmtcache_sqlite::SqliteConnection;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let conn = SqliteConnection::open_in_memory()?;
//! conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//! let ctx = Context::background();
//! let insert = conn.prepare(&ctx, "INSERT INTO users (name) VALUES (?1)")?;
//! conn.execute(&ctx, &insert, &params!["Alice"])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use stmtcache_core::{
    Connection, Context, Dialect, DriverError, ExecResult, IsolationLevel, Open, Rows, TxOptions,
    Value,
};

use crate::error::SqliteError;
use crate::options::SqliteOptions;
use crate::pool::Pool;
use crate::statement::{self, Interrupt, SqliteStatement};
use crate::transaction::SqliteTransaction;

static TRANSACTION_IDS: AtomicU64 = AtomicU64::new(1);

/// A pool of SQLite connections to one database.
pub struct SqliteConnection {
    pool: Arc<Pool>,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("options", self.pool.options())
            .field("idle", &self.pool.idle_count())
            .finish()
    }
}

impl SqliteConnection {
    pub fn open(options: SqliteOptions) -> Result<Self, SqliteError> {
        Ok(Self {
            pool: Pool::open(options)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, SqliteError> {
        Self::open(SqliteOptions::memory())
    }

    pub fn options(&self) -> &SqliteOptions {
        self.pool.options()
    }

    /// Number of connections currently idle in the pool.
    pub fn idle_connections(&self) -> usize {
        self.pool.idle_count()
    }

    /// Runs `f` with a pooled rusqlite connection.
    pub fn with_connection<R>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> rusqlite::Result<R>,
    ) -> Result<R, SqliteError> {
        let conn = self.pool.get()?;
        Ok(f(&conn)?)
    }

    /// Executes a batch of semicolon-separated statements without caching them.
    pub fn execute_batch(&self, sql: &str) -> Result<(), SqliteError> {
        self.with_connection(|conn| conn.execute_batch(sql))
    }
}

impl Connection for SqliteConnection {
    type Statement = SqliteStatement;
    type Transaction = SqliteTransaction;

    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    fn prepare(&self, ctx: &Context, sql: &str) -> Result<SqliteStatement, DriverError> {
        ctx.check()?;
        let conn = self.pool.get()?;
        let _interrupt = Interrupt::arm(&conn, ctx)?;
        SqliteStatement::prepare(&conn, sql).map_err(|err| statement::interrupted(ctx, err))
    }

    fn begin(&self, ctx: &Context, opts: &TxOptions) -> Result<SqliteTransaction, DriverError> {
        ctx.check()?;
        match opts.isolation {
            None | Some(IsolationLevel::Serializable) => {}
            Some(level) => return Err(SqliteError::UnsupportedIsolation(level).into()),
        }

        let conn = self.pool.get()?;
        let id = TRANSACTION_IDS.fetch_add(1, Ordering::Relaxed);
        let begin = self.pool.options().get_txlock().begin_sql();
        SqliteTransaction::begin(ctx, conn, id, begin, opts.read_only)
    }

    fn execute(
        &self,
        ctx: &Context,
        stmt: &SqliteStatement,
        params: &[Value],
    ) -> Result<ExecResult, DriverError> {
        let conn = self.pool.get()?;
        statement::execute(&conn, ctx, stmt, params)
    }

    fn query(
        &self,
        ctx: &Context,
        stmt: &SqliteStatement,
        params: &[Value],
    ) -> Result<Rows, DriverError> {
        let conn = self.pool.get()?;
        statement::query(&conn, ctx, stmt, params)
    }

    fn close(self) -> Result<(), DriverError> {
        Ok(self.pool.close()?)
    }
}

impl Open for SqliteConnection {
    const DIALECT: Dialect = Dialect::SQLite;

    fn open(dsn: &str) -> Result<Self, DriverError> {
        let options = SqliteOptions::from_dsn(dsn)?;
        Ok(Self::open(options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stmtcache_core::params;

    fn people() -> SqliteConnection {
        let conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             INSERT INTO people (id, name) VALUES (1, 'ada'), (2, 'grace');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn pooled_connections_share_memory_database() {
        let conn = people();
        let ctx = Context::background();
        let stmt = conn.prepare(&ctx, "SELECT name FROM people ORDER BY id").unwrap();

        // a second checkout opens a new connection to the same database
        let _held = conn.pool.get().unwrap();
        let rows = conn.query(&ctx, &stmt, &[]).unwrap();
        let names: Vec<String> = rows.decode().unwrap();
        assert_eq!(names, ["ada", "grace"]);
    }

    #[test]
    fn separate_memory_pools_are_isolated() {
        let a = people();
        let b = SqliteConnection::open_in_memory().unwrap();
        let ctx = Context::background();
        assert!(a.prepare(&ctx, "SELECT * FROM people").is_ok());
        assert!(b.prepare(&ctx, "SELECT * FROM people").is_err());
    }

    #[test]
    fn prepare_records_shape() {
        let conn = people();
        let stmt = conn
            .prepare(&Context::background(), "SELECT id, name FROM people WHERE id = ?1")
            .unwrap();
        assert_eq!(stmt.param_count(), 1);
        assert_eq!(stmt.columns(), ["id", "name"]);
        assert!(stmt.readonly());
    }

    #[test]
    fn execute_reports_changes_and_rowid() {
        let conn = people();
        let ctx = Context::background();
        let insert = conn
            .prepare(&ctx, "INSERT INTO people (name) VALUES (?1)")
            .unwrap();
        let result = conn.execute(&ctx, &insert, &params!["linus"]).unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(result.last_insert_id, Some(3));
    }

    #[test]
    fn unsupported_isolation_is_rejected() {
        let conn = people();
        let opts = TxOptions::default().isolation(IsolationLevel::ReadCommitted);
        assert!(conn.begin(&Context::background(), &opts).is_err());
    }

    #[test]
    fn canceled_context_stops_before_the_database() {
        let conn = people();
        let (ctx, cancel) = Context::with_cancel();
        cancel.cancel();
        let err = conn.prepare(&ctx, "SELECT 1").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<stmtcache_core::Error>(),
            Some(stmtcache_core::Error::Canceled)
        ));
    }

    #[test]
    fn open_from_dsn() {
        let conn = <SqliteConnection as Open>::open(":memory:?busy_timeout=10").unwrap();
        assert_eq!(
            conn.options().get_busy_timeout(),
            std::time::Duration::from_millis(10)
        );
        assert!(SqliteConnection::accepts("sqlite3"));
        assert!(!SqliteConnection::accepts("postgres"));
        conn.close().unwrap();
    }

    #[test]
    fn deadline_interrupts_a_running_statement() {
        let conn = people();
        let stmt = conn
            .prepare(
                &Context::background(),
                "WITH RECURSIVE n(i) AS (
                     SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 1000000000
                 )
                 SELECT count(*) FROM n",
            )
            .unwrap();

        let started = std::time::Instant::now();
        let ctx = Context::with_timeout(std::time::Duration::from_millis(20));
        let err = conn.query(&ctx, &stmt, &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<stmtcache_core::Error>(),
            Some(stmtcache_core::Error::DeadlineExceeded)
        ));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));

        // the handler is gone once the call returns
        let count = conn.prepare(&Context::background(), "SELECT count(*) FROM people").unwrap();
        let rows = conn.query(&Context::background(), &count, &[]).unwrap();
        assert_eq!(rows.decode::<i64>().unwrap(), [2]);
    }
}
