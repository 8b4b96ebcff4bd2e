//! A small pool of rusqlite connections sharing one database.
//!
//! Connections are opened on demand and returned to an idle list when the
//! [`PooledConnection`] guard drops. At most `max_idle` connections are kept.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};

use crate::error::SqliteError;
use crate::options::SqliteOptions;

pub(crate) struct Pool {
    options: SqliteOptions,
    uri: String,
    flags: OpenFlags,
    idle: Mutex<Vec<Connection>>,
    // keeps an in-memory database alive while every pooled connection is closed
    anchor: Mutex<Option<Connection>>,
}

impl Pool {
    /// Opens the pool and its first connection, so a bad data source fails here.
    pub(crate) fn open(options: SqliteOptions) -> Result<Arc<Self>, SqliteError> {
        let uri = options.uri();
        let flags = options.flags();
        let pool = Self {
            options,
            uri,
            flags,
            idle: Mutex::new(Vec::new()),
            anchor: Mutex::new(None),
        };

        let first = pool.connect()?;
        if pool.options.is_memory() {
            *pool.anchor.lock() = Some(pool.connect()?);
        }
        pool.idle.lock().push(first);

        Ok(Arc::new(pool))
    }

    pub(crate) fn options(&self) -> &SqliteOptions {
        &self.options
    }

    fn connect(&self) -> Result<Connection, SqliteError> {
        let conn = Connection::open_with_flags(&self.uri, self.flags)?;
        conn.busy_timeout(self.options.get_busy_timeout())?;
        conn.set_prepared_statement_cache_capacity(self.options.get_statement_cache());
        if let Some(enabled) = self.options.get_foreign_keys() {
            let flag = if enabled { "ON" } else { "OFF" };
            conn.execute_batch(&format!("PRAGMA foreign_keys = {flag}"))?;
        }
        Ok(conn)
    }

    /// Checks out an idle connection, opening a new one if none is idle.
    pub(crate) fn get(self: &Arc<Self>) -> Result<PooledConnection, SqliteError> {
        let idle = self.idle.lock().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => self.connect()?,
        };
        Ok(PooledConnection {
            pool: Arc::clone(self),
            conn: Some(conn),
        })
    }

    fn put(&self, conn: Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < self.options.get_max_idle() {
            idle.push(conn);
        }
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Closes every idle connection, reporting the first failure.
    pub(crate) fn close(&self) -> Result<(), SqliteError> {
        let mut connections = std::mem::take(&mut *self.idle.lock());
        connections.extend(self.anchor.lock().take());

        let mut first_err = None;
        for conn in connections {
            if let Err((_, err)) = conn.close() {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

/// A connection checked out of the [`Pool`], returned to it on drop.
pub(crate) struct PooledConnection {
    pool: Arc<Pool>,
    conn: Option<Connection>,
}

impl PooledConnection {
    /// Busy timeout the pool configures on every connection.
    pub(crate) fn busy_timeout_setting(&self) -> std::time::Duration {
        self.pool.options.get_busy_timeout()
    }

    /// Closes the connection instead of returning it to the pool.
    ///
    /// The guard must not be dereferenced afterwards.
    pub(crate) fn discard(&mut self) {
        drop(self.conn.take());
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // only `None` during drop or after `discard`
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put(conn);
        }
    }
}
