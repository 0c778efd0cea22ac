use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::SqlMapperError;
use crate::results::ResultSet;
use crate::types::SqlValue;

use super::params::bind_params;

/// Extract a [`SqlValue`] from a `SQLite` row.
///
/// # Errors
/// Returns `SqlMapperError::ExecutionError` if the column cannot be read.
pub fn sqlite_extract_value(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> Result<SqlValue, SqlMapperError> {
    let value: Value = row
        .get(idx)
        .map_err(|e| SqlMapperError::ExecutionError(format!("sqlite column {idx}: {e}")))?;
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Int(i),
        Value::Real(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    })
}

/// Bind `params`, run the statement and collect every row in cursor order.
///
/// # Errors
/// Returns `SqlMapperError::BindingError` on a slot mismatch, `ExecutionError` otherwise.
pub fn build_result_set(
    stmt: &mut Statement<'_>,
    params: &[Value],
) -> Result<ResultSet, SqlMapperError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    bind_params(stmt, params)?;
    let mut rows = stmt.raw_query();
    let mut result_set = ResultSet::with_capacity(column_names, 10);

    while let Some(row) = rows
        .next()
        .map_err(|e| SqlMapperError::ExecutionError(format!("sqlite select error: {e}")))?
    {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value(row, i)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}
