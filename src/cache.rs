use std::sync::Arc;

use stmtcache_core::{
    Connection, Context, DriverError, Error, ExecResult, FromRow, NamedArgs, NamedStatement, Open,
    Result, Row, Rows, TxOptions, Value,
};

use crate::ops::{self, Resolve};
use crate::statements::StatementMap;
use crate::transaction::TransactionScope;

/// Counters describing one cache's two namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Positional statements currently cached
    pub positional: usize,
    /// Named statements currently cached
    pub named: usize,
    /// Handles created, across both namespaces
    pub prepares: u64,
    /// Lookups answered from the cache, across both namespaces
    pub hits: u64,
}

impl CacheStats {
    pub(crate) fn of<P, N>(positional: &StatementMap<P>, named: &StatementMap<N>) -> Self {
        Self {
            positional: positional.len(),
            named: named.len(),
            prepares: positional.prepares() + named.prepares(),
            hits: positional.hits() + named.hits(),
        }
    }
}

/// A prepared statement cache in front of a driver connection.
///
/// Statements are keyed by their literal SQL text and prepared at most once,
/// however many threads ask for them. Positional and named statements live in
/// separate maps with separate locks.
///
/// ```no_run
/// use stmtcache::{StatementCache, params};
///
/// # fn main() -> stmtcache::Result<()> {
/// let cache = stmtcache::open("sqlite3", ":memory:")?;
/// cache.exec("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT)", &[])?;
/// cache.exec("INSERT INTO person (name) VALUES (?)", &params!["Ada"])?;
///
/// let name: String = cache.get("SELECT name FROM person WHERE id = ?", &params![1])?;
/// assert_eq!(name, "Ada");
/// # Ok(())
/// # }
/// ```
pub struct StatementCache<C: Connection> {
    conn: C,
    positional: StatementMap<C::Statement>,
    named: StatementMap<NamedStatement<C::Statement>>,
}

impl<C: Connection + std::fmt::Debug> std::fmt::Debug for StatementCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementCache")
            .field("conn", &self.conn)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<C: Open> StatementCache<C> {
    /// Opens a driver connection by driver name and data source string.
    pub fn open(driver_name: &str, dsn: &str) -> Result<Self> {
        if !C::accepts(driver_name) {
            return Err(Error::Connection(
                format!("unknown driver `{driver_name}`").into(),
            ));
        }
        let conn = C::open(dsn).map_err(Error::Connection)?;
        Ok(Self::new(conn))
    }
}

impl<C: Connection> StatementCache<C> {
    /// Wraps an open connection with an empty cache.
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            positional: StatementMap::new("positional", "pool"),
            named: StatementMap::new("named", "pool"),
        }
    }

    /// The underlying driver connection, for anything this layer does not wrap.
    pub fn conn(&self) -> &C {
        &self.conn
    }

    /// Closes the driver connection. Cached handles are released with it.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(Error::Connection)
    }

    /// Entry counts and prepare/hit counters for both namespaces.
    pub fn stats(&self) -> CacheStats {
        CacheStats::of(&self.positional, &self.named)
    }

    /// Returns the cached handle for `query`, preparing it on first use.
    pub fn resolve_positional(&self, query: &str) -> Result<Arc<C::Statement>> {
        self.resolve_positional_context(&Context::background(), query)
    }

    /// [`resolve_positional`](Self::resolve_positional) under `ctx`.
    pub fn resolve_positional_context(
        &self,
        ctx: &Context,
        query: &str,
    ) -> Result<Arc<C::Statement>> {
        self.positional.get_or_try_insert_with(ctx, query, || {
            self.conn
                .prepare(ctx, query)
                .map_err(|source| prepare_error(ctx, query, source))
        })
    }

    /// Returns the cached handle for a query with `:name` placeholders,
    /// preparing it on first use.
    pub fn resolve_named(&self, query: &str) -> Result<Arc<NamedStatement<C::Statement>>> {
        self.resolve_named_context(&Context::background(), query)
    }

    /// [`resolve_named`](Self::resolve_named) under `ctx`.
    pub fn resolve_named_context(
        &self,
        ctx: &Context,
        query: &str,
    ) -> Result<Arc<NamedStatement<C::Statement>>> {
        self.named.get_or_try_insert_with(ctx, query, || {
            self.conn
                .prepare_named(ctx, query)
                .map_err(|source| prepare_error(ctx, query, source))
        })
    }

    /// Begins a transaction with the driver's default options.
    pub fn begin(&self) -> Result<TransactionScope<'_, C>> {
        self.begin_with(&Context::background(), &TxOptions::default())
    }

    /// Begins a transaction with explicit options, honouring `ctx` while it starts.
    pub fn begin_with(&self, ctx: &Context, opts: &TxOptions) -> Result<TransactionScope<'_, C>> {
        ctx.check()?;
        let tx = self
            .conn
            .begin(ctx, opts)
            .map_err(|source| ops::context_or(ctx, source, Error::Transaction))?;
        Ok(TransactionScope::new(self, tx))
    }
}

fn prepare_error(ctx: &Context, query: &str, source: DriverError) -> Error {
    ops::context_or(ctx, source, |source| Error::Prepare {
        query: query.to_owned(),
        source,
    })
}

impl<C: Connection> Resolve for StatementCache<C> {
    type Statement = C::Statement;

    fn resolve_statement(&self, ctx: &Context, query: &str) -> Result<Arc<C::Statement>> {
        self.resolve_positional_context(ctx, query)
    }

    fn resolve_named_statement(
        &self,
        ctx: &Context,
        query: &str,
    ) -> Result<Arc<NamedStatement<C::Statement>>> {
        self.resolve_named_context(ctx, query)
    }

    fn run_execute(
        &self,
        ctx: &Context,
        stmt: &C::Statement,
        args: &[Value],
    ) -> std::result::Result<ExecResult, DriverError> {
        self.conn.execute(ctx, stmt, args)
    }

    fn run_query(
        &self,
        ctx: &Context,
        stmt: &C::Statement,
        args: &[Value],
    ) -> std::result::Result<Rows, DriverError> {
        self.conn.query(ctx, stmt, args)
    }
}

impl_statement_ops!([C: Connection] StatementCache<C>);
