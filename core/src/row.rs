//! Result rows and the traits that decode them.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::{FromValue, Value};

/// Outcome of executing a statement that does not return rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Number of rows inserted, updated or deleted
    pub rows_affected: u64,
    /// Row id generated by the statement, when the driver reports one
    pub last_insert_id: Option<i64>,
}

/// A single result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Decodes the value at `index`.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.values.get(index).ok_or_else(|| {
            Error::decode(format!(
                "column index {index} out of range for row of {} columns",
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }

    /// Decodes the value of the column called `name`.
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T> {
        let index = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::decode(format!("no column named `{name}`")))?;
        self.get(index)
    }
}

/// A fully materialized result set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rows {
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl Rows {
    pub fn new(columns: Arc<[String]>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// The first row, or [`Error::NoRows`].
    pub fn into_first(self) -> Result<Row> {
        self.rows.into_iter().next().ok_or(Error::NoRows)
    }

    /// Decodes every row into `T`.
    pub fn decode<T: FromRow>(&self) -> Result<Vec<T>> {
        self.rows.iter().map(T::from_row).collect()
    }
}

impl IntoIterator for Rows {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a Rows {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Decodes a whole row into a Rust type.
///
/// Scalar types accept only single-column rows, tuples decode one column per
/// element, and [`Row`] decodes into itself.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.clone())
    }
}

fn single_column<T: FromValue>(row: &Row) -> Result<T> {
    if row.len() != 1 {
        return Err(Error::decode(format!(
            "scannable destination type with {} columns in result",
            row.len()
        )));
    }
    row.get(0)
}

macro_rules! from_row_scalar {
    ($($ty:ty),*) => {
        $(
            impl FromRow for $ty {
                fn from_row(row: &Row) -> Result<Self> {
                    single_column(row)
                }
            }
        )*
    };
}

from_row_scalar!(
    Value, i8, i16, i32, i64, u8, u16, u32, u64, usize, bool, f64, String, Vec<u8>
);

impl<T: FromValue> FromRow for Option<T> {
    fn from_row(row: &Row) -> Result<Self> {
        single_column(row)
    }
}

macro_rules! from_row_tuple {
    ($len:literal => $($name:ident $idx:tt),+) => {
        impl<$($name: FromValue),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> Result<Self> {
                if row.len() != $len {
                    return Err(Error::decode(format!(
                        "expected {} columns, found {}",
                        $len,
                        row.len()
                    )));
                }
                Ok(($(row.get::<$name>($idx)?,)+))
            }
        }
    };
}

from_row_tuple!(1 => A 0);
from_row_tuple!(2 => A 0, B 1);
from_row_tuple!(3 => A 0, B 1, C 2);
from_row_tuple!(4 => A 0, B 1, C 2, D 3);
from_row_tuple!(5 => A 0, B 1, C 2, D 3, E 4);
from_row_tuple!(6 => A 0, B 1, C 2, D 3, E 4, F 5);
from_row_tuple!(7 => A 0, B 1, C 2, D 3, E 4, F 5, G 6);
from_row_tuple!(8 => A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
