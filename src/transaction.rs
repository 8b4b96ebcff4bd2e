use std::sync::Arc;

use stmtcache_core::{
    Connection, Context, DriverError, Error, ExecResult, FromRow, NamedArgs, NamedStatement,
    Result, Row, Rows, Transaction, Value,
};

use crate::cache::{CacheStats, StatementCache};
use crate::ops::{self, Resolve};
use crate::statements::StatementMap;

/// Statement handle bound to a transaction of connection type `C`.
pub type TxStatement<C> = <<C as Connection>::Transaction as Transaction>::Statement;

/// A transaction started from a [`StatementCache`].
///
/// Offers the same operations as the cache. Statements are resolved through
/// the cache first and then bound into the transaction, so a query prepared on
/// the pool is never prepared again for a transaction. Bound handles are cached
/// per scope and dropped with it.
///
/// The transaction is rolled back if the scope is dropped without calling
/// [`commit`](Self::commit) or [`rollback`](Self::rollback).
pub struct TransactionScope<'c, C: Connection> {
    cache: &'c StatementCache<C>,
    // `None` only after commit or rollback
    tx: Option<C::Transaction>,
    positional: StatementMap<TxStatement<C>>,
    named: StatementMap<NamedStatement<TxStatement<C>>>,
}

impl<C: Connection> std::fmt::Debug for TransactionScope<'_, C>
where
    C::Transaction: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("tx", &self.tx)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<'c, C: Connection> TransactionScope<'c, C> {
    pub(crate) fn new(cache: &'c StatementCache<C>, tx: C::Transaction) -> Self {
        Self {
            cache,
            tx: Some(tx),
            positional: StatementMap::new("positional", "transaction"),
            named: StatementMap::new("named", "transaction"),
        }
    }

    /// The driver transaction, for anything this layer does not wrap.
    pub fn inner(&self) -> &C::Transaction {
        self.tx.as_ref().unwrap_or_else(|| unreachable!())
    }

    /// The cache this transaction resolves statements through.
    pub fn cache(&self) -> &'c StatementCache<C> {
        self.cache
    }

    /// Counters for this transaction's own maps; `prepares` counts binds.
    pub fn stats(&self) -> CacheStats {
        CacheStats::of(&self.positional, &self.named)
    }

    /// Commits the transaction and releases its bound statements.
    pub fn commit(mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => tx.commit().map_err(Error::Transaction),
            None => Ok(()),
        }
    }

    /// Rolls the transaction back and releases its bound statements.
    pub fn rollback(mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => tx.rollback().map_err(Error::Transaction),
            None => Ok(()),
        }
    }

    /// Returns this transaction's handle for `query`, resolving it through
    /// the cache and binding it on first use.
    pub fn resolve_positional(&self, query: &str) -> Result<Arc<TxStatement<C>>> {
        self.resolve_positional_context(&Context::background(), query)
    }

    /// [`resolve_positional`](Self::resolve_positional) under `ctx`.
    pub fn resolve_positional_context(
        &self,
        ctx: &Context,
        query: &str,
    ) -> Result<Arc<TxStatement<C>>> {
        self.positional.get_or_try_insert_with(ctx, query, || {
            let pooled = self.cache.resolve_positional_context(ctx, query)?;
            self.inner()
                .bind(ctx, &pooled)
                .map_err(|source| bind_error(ctx, query, source))
        })
    }

    /// Like [`resolve_positional`](Self::resolve_positional) for a query with
    /// `:name` placeholders.
    pub fn resolve_named(&self, query: &str) -> Result<Arc<NamedStatement<TxStatement<C>>>> {
        self.resolve_named_context(&Context::background(), query)
    }

    /// [`resolve_named`](Self::resolve_named) under `ctx`.
    pub fn resolve_named_context(
        &self,
        ctx: &Context,
        query: &str,
    ) -> Result<Arc<NamedStatement<TxStatement<C>>>> {
        self.named.get_or_try_insert_with(ctx, query, || {
            let pooled = self.cache.resolve_named_context(ctx, query)?;
            let bound = self
                .inner()
                .bind(ctx, pooled.statement())
                .map_err(|source| bind_error(ctx, query, source))?;
            Ok(pooled.rebind(bound))
        })
    }
}

fn bind_error(ctx: &Context, query: &str, source: DriverError) -> Error {
    ops::context_or(ctx, source, |source| Error::Bind {
        query: query.to_owned(),
        source,
    })
}

impl<C: Connection> Drop for TransactionScope<'_, C> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take()
            && let Err(_err) = tx.rollback()
        {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_err, "stmtcache.transaction rollback on drop failed");
        }
    }
}

impl<C: Connection> Resolve for TransactionScope<'_, C> {
    type Statement = TxStatement<C>;

    fn resolve_statement(&self, ctx: &Context, query: &str) -> Result<Arc<TxStatement<C>>> {
        self.resolve_positional_context(ctx, query)
    }

    fn resolve_named_statement(
        &self,
        ctx: &Context,
        query: &str,
    ) -> Result<Arc<NamedStatement<TxStatement<C>>>> {
        self.resolve_named_context(ctx, query)
    }

    fn run_execute(
        &self,
        ctx: &Context,
        stmt: &TxStatement<C>,
        args: &[Value],
    ) -> std::result::Result<ExecResult, DriverError> {
        self.inner().execute(ctx, stmt, args)
    }

    fn run_query(
        &self,
        ctx: &Context,
        stmt: &TxStatement<C>,
        args: &[Value],
    ) -> std::result::Result<Rows, DriverError> {
        self.inner().query(ctx, stmt, args)
    }
}

impl_statement_ops!(['c, C: Connection] TransactionScope<'c, C>);
