use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use common::{GET_BY_ID, INSERT, MockDriver, SELECT_ALL};
use stmtcache::{CacheStats, Context, Error, StatementCache, Value, params};

mod common;

#[test]
fn concurrent_resolutions_prepare_once() {
    const CALLERS: usize = 16;

    let cache = Arc::new(StatementCache::new(MockDriver::with_delay(
        Duration::from_millis(20),
    )));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.resolve_positional(GET_BY_ID).unwrap()
            })
        })
        .collect();

    let statements: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(cache.conn().prepares(), 1);
    assert!(statements.iter().all(|s| Arc::ptr_eq(s, &statements[0])));
    assert_eq!(
        cache.stats(),
        CacheStats {
            positional: 1,
            named: 0,
            prepares: 1,
            hits: CALLERS as u64 - 1,
        }
    );
}

#[test]
fn concurrent_unrelated_queries_each_prepare_once() {
    let cache = Arc::new(StatementCache::new(MockDriver::with_delay(
        Duration::from_millis(5),
    )));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let query = format!("SELECT id FROM test_object WHERE id = {}", i % 4);
                cache.resolve_positional(&query).unwrap();
                cache.resolve_named(&query).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = cache.stats();
    assert_eq!((stats.positional, stats.named), (4, 4));
    assert_eq!(cache.conn().prepares(), 8);
}

#[test]
fn positional_and_named_namespaces_are_independent() {
    let cache = StatementCache::new(MockDriver::new());

    let positional = cache.resolve_positional(SELECT_ALL).unwrap();
    let named = cache.resolve_named(SELECT_ALL).unwrap();

    assert_eq!(cache.conn().prepares(), 2);
    assert_ne!(positional.id, named.statement().id);
    assert_eq!(cache.stats().positional, 1);
    assert_eq!(cache.stats().named, 1);

    // both are now cached
    cache.resolve_positional(SELECT_ALL).unwrap();
    cache.resolve_named(SELECT_ALL).unwrap();
    assert_eq!(cache.conn().prepares(), 2);
}

#[test]
fn keys_are_not_normalized() {
    let cache = StatementCache::new(MockDriver::new());
    cache.resolve_positional("SELECT id FROM test_object").unwrap();
    cache.resolve_positional("select id from test_object").unwrap();
    cache.resolve_positional("SELECT id  FROM test_object").unwrap();
    assert_eq!(cache.conn().prepares(), 3);
}

#[test]
fn failed_prepare_is_not_cached() {
    let cache = StatementCache::new(MockDriver::new());
    cache.conn().break_query(GET_BY_ID);

    let err = cache.resolve_positional(GET_BY_ID).unwrap_err();
    assert!(err.is_resolution_failure());
    assert!(matches!(&err, Error::Prepare { query, .. } if query == GET_BY_ID));
    assert_eq!(cache.stats().positional, 0);

    // still broken: the driver is asked again rather than a cached failure returned
    assert!(cache.resolve_positional(GET_BY_ID).is_err());

    cache.conn().fix(GET_BY_ID);
    cache.resolve_positional(GET_BY_ID).unwrap();
    assert_eq!(cache.stats().positional, 1);
    assert_eq!(cache.conn().prepares(), 1);
}

#[test]
fn named_compile_error_is_a_prepare_error() {
    let cache = StatementCache::new(MockDriver::new());
    let err = cache
        .resolve_named("SELECT id FROM test_object WHERE name = 'open")
        .unwrap_err();
    assert!(matches!(err, Error::Prepare { .. }));
    assert_eq!(cache.stats().named, 0);
}

#[test]
fn get_twice_prepares_once() {
    let cache = StatementCache::new(MockDriver::new().seed([0]));

    let id: i64 = cache.get(GET_BY_ID, &params![0]).unwrap();
    assert_eq!(id, 0);
    let again: i64 = cache.get(GET_BY_ID, &params![0]).unwrap();
    assert_eq!(again, 0);

    assert_eq!(cache.conn().prepares(), 1);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn query_row_without_rows() {
    let cache = StatementCache::new(MockDriver::new());
    assert!(matches!(
        cache.query_row(GET_BY_ID, &params![42]),
        Err(Error::NoRows)
    ));
    assert!(matches!(
        cache.get::<i64>(GET_BY_ID, &params![42]),
        Err(Error::NoRows)
    ));
}

#[test]
fn execution_errors_pass_through_and_keep_the_statement() {
    let cache = StatementCache::new(MockDriver::new().seed([7]));

    let err = cache.exec(INSERT, &params![7]).unwrap_err();
    assert!(!err.is_resolution_failure());
    match err {
        Error::Execution(source) => {
            assert_eq!(source.to_string(), "UNIQUE constraint failed: test_object.id")
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(cache.stats().positional, 1);
    let result = cache.exec(INSERT, &params![8]).unwrap();
    assert_eq!(result.rows_affected, 1);
    assert_eq!(cache.conn().prepares(), 1);
    assert_eq!(cache.conn().ids(), [7, 8]);
}

#[test]
fn named_operations() {
    let cache = StatementCache::new(MockDriver::new());

    cache
        .named_exec(
            "INSERT INTO test_object (id) VALUES (:id)",
            &[("id", Value::from(3))],
        )
        .unwrap();
    cache
        .named_exec(
            "INSERT INTO test_object (id) VALUES (:id)",
            &vec![("id".to_string(), Value::from(4))],
        )
        .unwrap();

    let id: i64 = cache
        .named_get("SELECT id FROM test_object WHERE id = :id", &[("id", Value::from(4))])
        .unwrap();
    assert_eq!(id, 4);

    let all: Vec<i64> = cache.named_select(SELECT_ALL, &[] as &[(&str, Value)]).unwrap();
    assert_eq!(all, [3, 4]);

    let row = cache
        .named_query_row("SELECT id FROM test_object WHERE id = :id", &[("id", Value::from(3))])
        .unwrap();
    assert_eq!(row.get::<i64>(0).unwrap(), 3);

    // one compiled statement per distinct named query
    assert_eq!(cache.stats().named, 3);
    assert_eq!(cache.stats().positional, 0);
}

#[test]
fn missing_named_argument() {
    let cache = StatementCache::new(MockDriver::new());
    let err = cache
        .named_get::<i64, _>(
            "SELECT id FROM test_object WHERE id = :id",
            &[("other", Value::from(1))],
        )
        .unwrap_err();

    assert!(matches!(err, Error::MissingNamedArg(name) if name == "id"));
    // the statement itself was fine
    assert_eq!(cache.stats().named, 1);
}

#[test]
fn select_and_query() {
    let cache = StatementCache::new(MockDriver::new().seed([2, 1, 3]));

    let ids: Vec<i64> = cache.select(SELECT_ALL, &[]).unwrap();
    assert_eq!(ids, [1, 2, 3]);

    let rows = cache.query(SELECT_ALL, &[]).unwrap();
    assert_eq!(rows.columns(), ["id"]);
    assert_eq!(rows.len(), 3);
    assert_eq!(cache.conn().prepares(), 1);
}

#[test]
fn canceled_context_leaves_no_entry() {
    let cache = StatementCache::new(MockDriver::new());
    let (ctx, cancel) = Context::with_cancel();
    cancel.cancel();

    let err = cache.resolve_positional_context(&ctx, GET_BY_ID).unwrap_err();
    assert!(matches!(err, Error::Canceled));
    assert!(matches!(
        cache.get_context::<i64>(&ctx, GET_BY_ID, &params![0]),
        Err(Error::Canceled)
    ));

    assert_eq!(cache.conn().prepares(), 0);
    assert_eq!(cache.stats(), CacheStats::default());
}

#[test]
fn deadline_during_prepare_discards_the_statement() {
    let cache = StatementCache::new(MockDriver::with_delay(Duration::from_millis(50)));
    let ctx = Context::with_timeout(Duration::from_millis(10));

    let err = cache.resolve_positional_context(&ctx, GET_BY_ID).unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded));
    assert_eq!(cache.stats().positional, 0);

    // the driver did prepare, the cache dropped it
    assert_eq!(cache.conn().prepares(), 1);
    cache.resolve_positional(GET_BY_ID).unwrap();
    assert_eq!(cache.conn().prepares(), 2);
}

#[test]
fn waiting_for_the_lock_honours_the_deadline() {
    let cache = Arc::new(StatementCache::new(MockDriver::with_delay(
        Duration::from_millis(300),
    )));

    let slow = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.resolve_positional(SELECT_ALL).map(|_| ()))
    };
    // let the slow prepare take the lock
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    let ctx = Context::with_timeout(Duration::from_millis(30));
    let err = cache.resolve_positional_context(&ctx, GET_BY_ID).unwrap_err();

    assert!(matches!(err, Error::DeadlineExceeded));
    assert!(started.elapsed() < Duration::from_millis(250));
    slow.join().unwrap().unwrap();
    assert_eq!(cache.stats().positional, 1);
}

#[test]
fn open_by_driver_name() {
    let cache = StatementCache::<MockDriver>::open("postgres", "mock://db").unwrap();
    assert_eq!(cache.stats(), CacheStats::default());
    cache.close().unwrap();

    assert!(matches!(
        StatementCache::<MockDriver>::open("mysql", "mock://db"),
        Err(Error::Connection(_))
    ));
    assert!(matches!(
        StatementCache::<MockDriver>::open("pg", "tcp://db"),
        Err(Error::Connection(_))
    ));
}
