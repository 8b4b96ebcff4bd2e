//! Connection options and data source string parsing.
//!
//! Accepted data source strings:
//!
//! | DSN | database |
//! |-----|----------|
//! | `:memory:`, `sqlite::memory:`, `file::memory:` | private in-memory database shared by the pool |
//! | `app.db`, `sqlite://app.db`, `file:app.db` | file on disk |
//!
//! Query parameters (`app.db?busy_timeout=1000&txlock=immediate`):
//! `mode` (`ro`, `rw`, `rwc`, `memory`), `busy_timeout` (milliseconds),
//! `max_idle`, `statement_cache` (per-connection capacity), `txlock`
//! (`deferred`, `immediate`, `exclusive`) and `foreign_keys` (`true`/`false`).
//! Any other parameter is handed to SQLite as a URI parameter.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rusqlite::OpenFlags;

use crate::error::SqliteError;

static MEMORY_DATABASES: AtomicU64 = AtomicU64::new(0);

/// SQLite transaction types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SqliteTransactionType {
    #[default]
    /// A deferred transaction is the default - it does not acquire locks until needed
    Deferred,
    /// An immediate transaction acquires a RESERVED lock immediately
    Immediate,
    /// An exclusive transaction acquires an EXCLUSIVE lock immediately
    Exclusive,
}

impl SqliteTransactionType {
    pub const fn begin_sql(&self) -> &'static str {
        match self {
            SqliteTransactionType::Deferred => "BEGIN DEFERRED",
            SqliteTransactionType::Immediate => "BEGIN IMMEDIATE",
            SqliteTransactionType::Exclusive => "BEGIN EXCLUSIVE",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "deferred" => Some(SqliteTransactionType::Deferred),
            "immediate" => Some(SqliteTransactionType::Immediate),
            "exclusive" => Some(SqliteTransactionType::Exclusive),
            _ => None,
        }
    }
}

/// How the database file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
    #[default]
    ReadWriteCreate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Memory,
    Path(PathBuf),
}

/// Options used to open every connection of a pool.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    location: Location,
    mode: OpenMode,
    busy_timeout: Duration,
    max_idle: usize,
    statement_cache: usize,
    txlock: SqliteTransactionType,
    foreign_keys: Option<bool>,
    uri_params: Vec<(String, String)>,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self::memory()
    }
}

impl SqliteOptions {
    fn with_location(location: Location) -> Self {
        Self {
            location,
            mode: OpenMode::default(),
            busy_timeout: Duration::from_secs(5),
            max_idle: 2,
            statement_cache: 128,
            txlock: SqliteTransactionType::default(),
            foreign_keys: None,
            uri_params: Vec::new(),
        }
    }

    /// An in-memory database private to the pool that opens it.
    pub fn memory() -> Self {
        Self::with_location(Location::Memory)
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::with_location(Location::Path(path.into()))
    }

    /// Parses a data source string.
    pub fn from_dsn(dsn: &str) -> Result<Self, SqliteError> {
        let rest = dsn
            .strip_prefix("sqlite://")
            .or_else(|| dsn.strip_prefix("sqlite:"))
            .unwrap_or(dsn);
        let (location, query) = rest.split_once('?').unwrap_or((rest, ""));
        let location = location.strip_prefix("file:").unwrap_or(location);

        let mut options = if location.is_empty() || location == ":memory:" {
            Self::memory()
        } else {
            Self::file(location)
        };

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            options.apply(key, value)?;
        }
        Ok(options)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), SqliteError> {
        match key {
            "mode" => match value {
                "ro" => self.mode = OpenMode::ReadOnly,
                "rw" => self.mode = OpenMode::ReadWrite,
                "rwc" => self.mode = OpenMode::ReadWriteCreate,
                "memory" => self.location = Location::Memory,
                _ => return Err(SqliteError::invalid(key, format!("unknown mode `{value}`"))),
            },
            "busy_timeout" | "_busy_timeout" => {
                let ms: u64 = value
                    .parse()
                    .map_err(|_| SqliteError::invalid(key, "expected milliseconds"))?;
                self.busy_timeout = Duration::from_millis(ms);
            }
            "max_idle" => {
                self.max_idle = value
                    .parse()
                    .map_err(|_| SqliteError::invalid(key, "expected a connection count"))?;
            }
            "statement_cache" => {
                self.statement_cache = value
                    .parse()
                    .map_err(|_| SqliteError::invalid(key, "expected a statement count"))?;
            }
            "txlock" | "_txlock" => {
                self.txlock = SqliteTransactionType::parse(value).ok_or_else(|| {
                    SqliteError::invalid(key, "expected deferred, immediate or exclusive")
                })?;
            }
            "foreign_keys" | "_foreign_keys" | "_fk" => {
                self.foreign_keys = Some(parse_bool(value).ok_or_else(|| {
                    SqliteError::invalid(key, "expected a boolean")
                })?);
            }
            _ => self.uri_params.push((key.to_owned(), value.to_owned())),
        }
        Ok(())
    }

    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Maximum number of idle connections kept by the pool.
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Capacity of each connection's rusqlite statement cache.
    pub fn statement_cache(mut self, capacity: usize) -> Self {
        self.statement_cache = capacity;
        self
    }

    /// Locking behaviour of `BEGIN` for transactions started by the pool.
    pub fn txlock(mut self, txlock: SqliteTransactionType) -> Self {
        self.txlock = txlock;
        self
    }

    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = Some(enabled);
        self
    }

    pub fn is_memory(&self) -> bool {
        self.location == Location::Memory
    }

    pub fn get_busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    pub fn get_max_idle(&self) -> usize {
        self.max_idle
    }

    pub fn get_statement_cache(&self) -> usize {
        self.statement_cache
    }

    pub fn get_txlock(&self) -> SqliteTransactionType {
        self.txlock
    }

    pub fn get_foreign_keys(&self) -> Option<bool> {
        self.foreign_keys
    }

    /// Open flags for every connection.
    pub(crate) fn flags(&self) -> OpenFlags {
        let mode = match self.mode {
            OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            OpenMode::ReadWriteCreate => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        mode | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
    }

    /// Builds the URI every connection of one pool opens.
    ///
    /// In-memory databases get a fresh `memdb` name so that all pooled
    /// connections see the same data while no other pool does. A leading `/`
    /// makes the database visible to every connection in the process, and
    /// `memdb` locks it like a file rather than table by table.
    pub(crate) fn uri(&self) -> String {
        let mut uri = match &self.location {
            Location::Memory => {
                let id = MEMORY_DATABASES.fetch_add(1, Ordering::Relaxed);
                format!(
                    "file:/stmtcache-memory-{}-{id}?vfs=memdb",
                    std::process::id()
                )
            }
            Location::Path(path) => format!("file:{}", encode_path(&path.to_string_lossy())),
        };
        for (i, (key, value)) in self.uri_params.iter().enumerate() {
            let sep = if i == 0 && !uri.contains('?') { '?' } else { '&' };
            uri.push(sep);
            uri.push_str(key);
            uri.push('=');
            uri.push_str(value);
        }
        uri
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Escapes the characters that would end the path part of an SQLite URI.
fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '%' => out.push_str("%25"),
            '?' => out.push_str("%3f"),
            '#' => out.push_str("%23"),
            _ => out.push(c),
        }
    }
    out
}
