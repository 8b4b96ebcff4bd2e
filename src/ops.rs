//! Operations shared by [`StatementCache`](crate::StatementCache) and
//! [`TransactionScope`](crate::TransactionScope).
//!
//! Each operation resolves a cached handle, then runs it. Only the resolve and
//! run primitives differ between the pool and a transaction.

use std::sync::Arc;

use stmtcache_core::{
    Context, DriverError, Error, ExecResult, FromRow, NamedArgs, NamedStatement, Result, Row,
    Rows, Value,
};

pub(crate) trait Resolve {
    type Statement;

    fn resolve_statement(&self, ctx: &Context, query: &str) -> Result<Arc<Self::Statement>>;

    fn resolve_named_statement(
        &self,
        ctx: &Context,
        query: &str,
    ) -> Result<Arc<NamedStatement<Self::Statement>>>;

    fn run_execute(
        &self,
        ctx: &Context,
        stmt: &Self::Statement,
        args: &[Value],
    ) -> std::result::Result<ExecResult, DriverError>;

    fn run_query(
        &self,
        ctx: &Context,
        stmt: &Self::Statement,
        args: &[Value],
    ) -> std::result::Result<Rows, DriverError>;
}

/// Maps a driver failure to the context error if `ctx` already ended.
pub(crate) fn context_or(
    ctx: &Context,
    source: DriverError,
    wrap: impl FnOnce(DriverError) -> Error,
) -> Error {
    match ctx.err() {
        Some(err) => err,
        None => wrap(source),
    }
}

fn execute<R: Resolve>(
    r: &R,
    ctx: &Context,
    stmt: &R::Statement,
    args: &[Value],
) -> Result<ExecResult> {
    r.run_execute(ctx, stmt, args)
        .map_err(|source| context_or(ctx, source, Error::Execution))
}

fn fetch<R: Resolve>(r: &R, ctx: &Context, stmt: &R::Statement, args: &[Value]) -> Result<Rows> {
    r.run_query(ctx, stmt, args)
        .map_err(|source| context_or(ctx, source, Error::Execution))
}

pub(crate) fn exec<R: Resolve>(
    r: &R,
    ctx: &Context,
    query: &str,
    args: &[Value],
) -> Result<ExecResult> {
    let stmt = r.resolve_statement(ctx, query)?;
    execute(r, ctx, &stmt, args)
}

pub(crate) fn named_exec<R, A>(r: &R, ctx: &Context, query: &str, args: &A) -> Result<ExecResult>
where
    R: Resolve,
    A: NamedArgs + ?Sized,
{
    let stmt = r.resolve_named_statement(ctx, query)?;
    let bound = stmt.bind_args(args)?;
    execute(r, ctx, stmt.statement(), &bound)
}

pub(crate) fn query<R: Resolve>(r: &R, ctx: &Context, query: &str, args: &[Value]) -> Result<Rows> {
    let stmt = r.resolve_statement(ctx, query)?;
    fetch(r, ctx, &stmt, args)
}

pub(crate) fn named_query<R, A>(r: &R, ctx: &Context, query: &str, args: &A) -> Result<Rows>
where
    R: Resolve,
    A: NamedArgs + ?Sized,
{
    let stmt = r.resolve_named_statement(ctx, query)?;
    let bound = stmt.bind_args(args)?;
    fetch(r, ctx, stmt.statement(), &bound)
}

pub(crate) fn query_row<R: Resolve>(
    r: &R,
    ctx: &Context,
    sql: &str,
    args: &[Value],
) -> Result<Row> {
    query(r, ctx, sql, args)?.into_first()
}

pub(crate) fn named_query_row<R, A>(r: &R, ctx: &Context, sql: &str, args: &A) -> Result<Row>
where
    R: Resolve,
    A: NamedArgs + ?Sized,
{
    named_query(r, ctx, sql, args)?.into_first()
}

pub(crate) fn get<R: Resolve, T: FromRow>(
    r: &R,
    ctx: &Context,
    sql: &str,
    args: &[Value],
) -> Result<T> {
    T::from_row(&query_row(r, ctx, sql, args)?)
}

pub(crate) fn named_get<R, A, T>(r: &R, ctx: &Context, sql: &str, args: &A) -> Result<T>
where
    R: Resolve,
    A: NamedArgs + ?Sized,
    T: FromRow,
{
    T::from_row(&named_query_row(r, ctx, sql, args)?)
}

pub(crate) fn select<R: Resolve, T: FromRow>(
    r: &R,
    ctx: &Context,
    sql: &str,
    args: &[Value],
) -> Result<Vec<T>> {
    query(r, ctx, sql, args)?.decode()
}

pub(crate) fn named_select<R, A, T>(r: &R, ctx: &Context, sql: &str, args: &A) -> Result<Vec<T>>
where
    R: Resolve,
    A: NamedArgs + ?Sized,
    T: FromRow,
{
    named_query(r, ctx, sql, args)?.decode()
}
