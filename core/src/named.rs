//! Named-parameter statements.
//!
//! A named query such as `SELECT * FROM person WHERE first = :first` is
//! compiled into the driver's positional syntax once, when the statement is
//! prepared. The ordered list of names is kept next to the prepared statement
//! so each execution can pull its arguments out of a [`NamedArgs`] value.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::value::Value;

/// A query whose named placeholders were rewritten to positional ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    /// SQL text in the dialect's positional syntax
    pub sql: String,
    /// Parameter names, one per positional slot, in order
    pub names: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("unterminated {0} starting at byte {1}")]
    Unterminated(&'static str, usize),
}

#[inline]
fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

/// Copies a quoted section starting at `start` (the opening quote) and returns
/// the index just past the closing quote. Doubled quotes are escapes.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// Rewrites `:name` placeholders into `dialect`'s positional placeholders.
///
/// `::` is kept as-is so PostgreSQL casts survive, and nothing inside string
/// literals, quoted identifiers or comments is treated as a placeholder.
pub fn compile_named(
    query: &str,
    dialect: Dialect,
) -> std::result::Result<CompiledQuery, CompileError> {
    let bytes = query.as_bytes();
    let mut sql = String::with_capacity(query.len());
    let mut names = Vec::new();
    // start of the pending verbatim run
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                let kind = if quote == b'\'' { "string literal" } else { "quoted identifier" };
                i = skip_quoted(bytes, i, quote).ok_or(CompileError::Unterminated(kind, i))?;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = query[i + 2..]
                    .find("*/")
                    .ok_or(CompileError::Unterminated("block comment", i))?;
                i = i + 2 + end + 2;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                i += 2;
            }
            b':' if bytes.get(i + 1).is_some_and(|&b| is_name_byte(b)) => {
                let name_start = i + 1;
                let name_end = bytes[name_start..]
                    .iter()
                    .position(|&b| !is_name_byte(b))
                    .map_or(bytes.len(), |p| name_start + p);

                sql.push_str(&query[copied..i]);
                names.push(query[name_start..name_end].to_owned());
                sql.push_str(&dialect.render_placeholder(names.len()));

                i = name_end;
                copied = name_end;
            }
            _ => i += 1,
        }
    }
    sql.push_str(&query[copied..]);

    Ok(CompiledQuery { sql, names })
}

/// Source of named arguments for a named statement.
///
/// Implemented for maps and lists of `(name, value)` pairs; implement it for
/// your own structs to bind them directly.
pub trait NamedArgs {
    /// Returns the value bound to `name`, if any.
    fn named_value(&self, name: &str) -> Option<Value>;
}

impl<T: NamedArgs + ?Sized> NamedArgs for &T {
    fn named_value(&self, name: &str) -> Option<Value> {
        (**self).named_value(name)
    }
}

impl<S: std::hash::BuildHasher> NamedArgs for HashMap<String, Value, S> {
    fn named_value(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<S: std::hash::BuildHasher> NamedArgs for HashMap<&str, Value, S> {
    fn named_value(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<S: std::hash::BuildHasher> NamedArgs for hashbrown::HashMap<String, Value, S> {
    fn named_value(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl NamedArgs for BTreeMap<String, Value> {
    fn named_value(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl NamedArgs for BTreeMap<&str, Value> {
    fn named_value(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<K: AsRef<str>> NamedArgs for [(K, Value)] {
    fn named_value(&self, name: &str) -> Option<Value> {
        self.iter()
            .find(|(key, _)| key.as_ref() == name)
            .map(|(_, value)| value.clone())
    }
}

impl<K: AsRef<str>, const N: usize> NamedArgs for [(K, Value); N] {
    fn named_value(&self, name: &str) -> Option<Value> {
        self.as_slice().named_value(name)
    }
}

impl<K: AsRef<str>> NamedArgs for Vec<(K, Value)> {
    fn named_value(&self, name: &str) -> Option<Value> {
        self.as_slice().named_value(name)
    }
}

/// Positional arguments collected for one execution of a named statement.
pub type BoundArgs = SmallVec<[Value; 8]>;

/// A driver statement prepared from a compiled named query.
#[derive(Debug)]
pub struct NamedStatement<S> {
    statement: Arc<S>,
    names: Arc<[String]>,
}

impl<S> NamedStatement<S> {
    pub fn new(statement: S, names: impl Into<Arc<[String]>>) -> Self {
        Self {
            statement: Arc::new(statement),
            names: names.into(),
        }
    }

    /// The positional statement the driver prepared.
    pub fn statement(&self) -> &Arc<S> {
        &self.statement
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Wraps another statement compiled from the same named query, such as a
    /// transaction-bound copy of this one.
    pub fn rebind<T>(&self, statement: T) -> NamedStatement<T> {
        NamedStatement {
            statement: Arc::new(statement),
            names: self.names.clone(),
        }
    }

    /// Resolves every parameter name against `args`, in placeholder order.
    pub fn bind_args<A: NamedArgs + ?Sized>(&self, args: &A) -> Result<BoundArgs> {
        self.names
            .iter()
            .map(|name| {
                args.named_value(name)
                    .ok_or_else(|| Error::MissingNamedArg(name.clone()))
            })
            .collect()
    }
}
