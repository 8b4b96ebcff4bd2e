//! A driver double that counts prepares and binds.
//!
//! It understands just enough SQL for the tests: inserts into and selects
//! from a single-column `test_object` table.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use stmtcache::{
    Connection, Context, Dialect, DriverError, ExecResult, Open, Row, Rows, Transaction,
    TxOptions, Value,
};

pub const GET_BY_ID: &str = "SELECT id FROM test_object WHERE id = $1";
pub const INSERT: &str = "INSERT INTO test_object (id) VALUES ($1)";
pub const SELECT_ALL: &str = "SELECT id FROM test_object ORDER BY id";

#[derive(Debug, Default)]
pub struct Counters {
    pub prepares: AtomicUsize,
    pub binds: AtomicUsize,
    pub begins: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
}

#[derive(Debug, Default)]
pub struct MockDriver {
    pub counters: Arc<Counters>,
    next_id: AtomicUsize,
    delay: Duration,
    broken: Mutex<HashSet<String>>,
    table: Arc<Mutex<BTreeSet<i64>>>,
    fail_begin: AtomicBool,
    fail_bind: Arc<AtomicBool>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every prepare blocks for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn seed(self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.table.lock().extend(ids);
        self
    }

    /// Makes preparing `sql` fail until [`MockDriver::fix`] is called.
    pub fn break_query(&self, sql: &str) {
        self.broken.lock().insert(sql.to_owned());
    }

    pub fn fix(&self, sql: &str) {
        self.broken.lock().remove(sql);
    }

    pub fn fail_begin(&self, fail: bool) {
        self.fail_begin.store(fail, Ordering::SeqCst);
    }

    pub fn fail_bind(&self, fail: bool) {
        self.fail_bind.store(fail, Ordering::SeqCst);
    }

    pub fn prepares(&self) -> usize {
        self.counters.prepares.load(Ordering::SeqCst)
    }

    pub fn binds(&self) -> usize {
        self.counters.binds.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.counters.rollbacks.load(Ordering::SeqCst)
    }

    pub fn ids(&self) -> Vec<i64> {
        self.table.lock().iter().copied().collect()
    }
}

#[derive(Debug)]
pub struct MockStatement {
    pub id: usize,
    pub sql: String,
}

#[derive(Debug)]
pub struct MockTxStatement {
    pub pool: Arc<MockStatement>,
    pub tx: usize,
}

#[derive(Debug)]
pub struct MockTransaction {
    pub id: usize,
    counters: Arc<Counters>,
    table: Arc<Mutex<BTreeSet<i64>>>,
    pending: Mutex<Vec<i64>>,
    fail_bind: Arc<AtomicBool>,
}

fn integer(args: &[Value]) -> Result<i64, DriverError> {
    match args.first() {
        Some(Value::Integer(i)) => Ok(*i),
        other => Err(format!("expected an integer argument, got {other:?}").into()),
    }
}

fn run_execute(
    ctx: &Context,
    sql: &str,
    args: &[Value],
    visible: &BTreeSet<i64>,
    insert: impl FnOnce(i64),
) -> Result<ExecResult, DriverError> {
    ctx.check()?;
    if !sql.starts_with("INSERT") {
        return Ok(ExecResult::default());
    }
    let id = integer(args)?;
    if visible.contains(&id) {
        return Err("UNIQUE constraint failed: test_object.id".into());
    }
    insert(id);
    Ok(ExecResult {
        rows_affected: 1,
        last_insert_id: Some(id),
    })
}

fn run_query(
    ctx: &Context,
    sql: &str,
    args: &[Value],
    visible: &BTreeSet<i64>,
) -> Result<Rows, DriverError> {
    ctx.check()?;
    let columns: Arc<[String]> = Arc::from(vec!["id".to_owned()]);
    let ids: Vec<i64> = if sql.contains("WHERE") {
        let id = integer(args)?;
        visible.iter().copied().filter(|&i| i == id).collect()
    } else {
        visible.iter().copied().collect()
    };
    let rows = ids
        .into_iter()
        .map(|id| Row::new(columns.clone(), vec![Value::Integer(id)]))
        .collect();
    Ok(Rows::new(columns, rows))
}

impl Connection for MockDriver {
    type Statement = MockStatement;
    type Transaction = MockTransaction;

    fn dialect(&self) -> Dialect {
        Dialect::PostgreSQL
    }

    fn prepare(&self, ctx: &Context, sql: &str) -> Result<MockStatement, DriverError> {
        ctx.check()?;
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.broken.lock().contains(sql) {
            return Err(format!("syntax error in `{sql}`").into());
        }
        self.counters.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(MockStatement {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            sql: sql.to_owned(),
        })
    }

    fn begin(&self, ctx: &Context, _opts: &TxOptions) -> Result<MockTransaction, DriverError> {
        ctx.check()?;
        if self.fail_begin.load(Ordering::SeqCst) {
            return Err("connection pool exhausted".into());
        }
        let id = self.counters.begins.fetch_add(1, Ordering::SeqCst);
        Ok(MockTransaction {
            id,
            counters: Arc::clone(&self.counters),
            table: Arc::clone(&self.table),
            pending: Mutex::new(Vec::new()),
            fail_bind: Arc::clone(&self.fail_bind),
        })
    }

    fn execute(
        &self,
        ctx: &Context,
        stmt: &MockStatement,
        args: &[Value],
    ) -> Result<ExecResult, DriverError> {
        let mut table = self.table.lock();
        let visible = table.clone();
        run_execute(ctx, &stmt.sql, args, &visible, |id| {
            table.insert(id);
        })
    }

    fn query(
        &self,
        ctx: &Context,
        stmt: &MockStatement,
        args: &[Value],
    ) -> Result<Rows, DriverError> {
        run_query(ctx, &stmt.sql, args, &self.table.lock())
    }

    fn close(self) -> Result<(), DriverError> {
        Ok(())
    }
}

impl Open for MockDriver {
    const DIALECT: Dialect = Dialect::PostgreSQL;

    fn open(dsn: &str) -> Result<Self, DriverError> {
        if !dsn.starts_with("mock://") {
            return Err(format!("cannot reach `{dsn}`").into());
        }
        Ok(Self::new())
    }
}

impl MockTransaction {
    fn visible(&self) -> BTreeSet<i64> {
        let mut visible = self.table.lock().clone();
        visible.extend(self.pending.lock().iter().copied());
        visible
    }
}

impl Transaction for MockTransaction {
    type PoolStatement = MockStatement;
    type Statement = MockTxStatement;

    fn bind(
        &self,
        ctx: &Context,
        stmt: &Arc<MockStatement>,
    ) -> Result<MockTxStatement, DriverError> {
        ctx.check()?;
        if self.fail_bind.load(Ordering::SeqCst) {
            return Err("transaction connection lost".into());
        }
        self.counters.binds.fetch_add(1, Ordering::SeqCst);
        Ok(MockTxStatement {
            pool: Arc::clone(stmt),
            tx: self.id,
        })
    }

    fn execute(
        &self,
        ctx: &Context,
        stmt: &MockTxStatement,
        args: &[Value],
    ) -> Result<ExecResult, DriverError> {
        assert_eq!(stmt.tx, self.id, "statement bound to another transaction");
        let visible = self.visible();
        run_execute(ctx, &stmt.pool.sql, args, &visible, |id| {
            self.pending.lock().push(id);
        })
    }

    fn query(
        &self,
        ctx: &Context,
        stmt: &MockTxStatement,
        args: &[Value],
    ) -> Result<Rows, DriverError> {
        assert_eq!(stmt.tx, self.id, "statement bound to another transaction");
        run_query(ctx, &stmt.pool.sql, args, &self.visible())
    }

    fn commit(self) -> Result<(), DriverError> {
        self.table.lock().extend(self.pending.lock().drain(..));
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(self) -> Result<(), DriverError> {
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
