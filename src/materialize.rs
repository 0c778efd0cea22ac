//! Result materialization: one typed value per row.

use std::collections::{BTreeMap, HashMap};

use crate::error::SqlMapperError;
use crate::record::Record;
use crate::results::{ResultSet, Row};
use crate::types::{FromSqlValue, SqlValue};

/// Scalar target kinds; a scalar reads the first column only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Integer,
    Float,
    Text,
    Bool,
    /// The raw [`SqlValue`] of the first column.
    Value,
}

/// The shape a row is materialized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    Scalar(ScalarKind),
    /// Column name → value for every column.
    Map,
    /// A [`Record`] type, by name.
    Record(&'static str),
}

/// Types a single result row can be turned into.
pub trait FromRow: Sized + Send + 'static {
    fn shape() -> ResultShape;

    /// # Errors
    /// Returns `SqlMapperError::MappingError` when the row does not fit the shape.
    fn from_row(row: &Row) -> Result<Self, SqlMapperError>;
}

/// Materialize one row into `T`.
///
/// # Errors
/// See [`FromRow::from_row`].
pub fn materialize<T: FromRow>(row: &Row) -> Result<T, SqlMapperError> {
    T::from_row(row)
}

/// Materialize every row, preserving cursor order. Zero rows give an empty vector.
///
/// # Errors
/// Fails on the first row that does not fit `T`.
pub fn materialize_all<T: FromRow>(rows: &ResultSet) -> Result<Vec<T>, SqlMapperError> {
    rows.rows().iter().map(T::from_row).collect()
}

/// Materialize the first row.
///
/// # Errors
/// Returns `SqlMapperError::MappingError` when there are no rows.
pub fn materialize_one<T: FromRow>(rows: &ResultSet) -> Result<T, SqlMapperError> {
    materialize_optional(rows)?.ok_or_else(|| {
        SqlMapperError::MappingError(format!(
            "expected one row for {:?}, query returned none",
            T::shape()
        ))
    })
}

/// Materialize the first row if there is one.
///
/// # Errors
/// Fails when the first row does not fit `T`.
pub fn materialize_optional<T: FromRow>(rows: &ResultSet) -> Result<Option<T>, SqlMapperError> {
    rows.rows().first().map(T::from_row).transpose()
}

/// Default-construct a record, then write each column into the field of the same name.
///
/// # Errors
/// Returns `SqlMapperError::MappingError` for a column without a matching field.
pub fn record_from_row<T: Record + Default>(row: &Row) -> Result<T, SqlMapperError> {
    let mut record = T::default();
    for (column, value) in row.iter() {
        record.set_field(column, value.clone())?;
    }
    Ok(record)
}

fn first_column(row: &Row) -> Result<SqlValue, SqlMapperError> {
    row.get_by_index(0).cloned().ok_or_else(|| {
        SqlMapperError::MappingError("scalar result requested from a row with no columns".into())
    })
}

fn scalar_from_row<T: FromSqlValue>(row: &Row) -> Result<T, SqlMapperError> {
    let column = row
        .column_names()
        .first()
        .cloned()
        .unwrap_or_default();
    T::from_sql_value(first_column(row)?).map_err(|e| match e {
        SqlMapperError::MappingError(msg) => {
            SqlMapperError::MappingError(format!("column `{column}`: {msg}"))
        }
        other => other,
    })
}

macro_rules! scalar_from_row {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl FromRow for $ty {
                fn shape() -> ResultShape {
                    ResultShape::Scalar(ScalarKind::$kind)
                }

                fn from_row(row: &Row) -> Result<Self, SqlMapperError> {
                    scalar_from_row(row)
                }
            }
        )*
    };
}

scalar_from_row!(
    i64 => Integer,
    i32 => Integer,
    f64 => Float,
    String => Text,
    bool => Bool,
    SqlValue => Value,
);

impl FromRow for HashMap<String, SqlValue> {
    fn shape() -> ResultShape {
        ResultShape::Map
    }

    fn from_row(row: &Row) -> Result<Self, SqlMapperError> {
        Ok(row
            .iter()
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect())
    }
}

impl FromRow for BTreeMap<String, SqlValue> {
    fn shape() -> ResultShape {
        ResultShape::Map
    }

    fn from_row(row: &Row) -> Result<Self, SqlMapperError> {
        Ok(row
            .iter()
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect())
    }
}
