use chrono::NaiveDateTime;
use serde_json::Value;
use tokio_postgres::Statement;

use crate::error::SqlMapperError;
use crate::results::ResultSet;
use crate::types::SqlValue;

fn extract_error(idx: usize, err: &tokio_postgres::Error) -> SqlMapperError {
    SqlMapperError::ExecutionError(format!("postgres column {idx}: {err}"))
}

/// Extracts a [`SqlValue`] from a `tokio_postgres` row at the given index.
///
/// # Errors
/// Returns `SqlMapperError::ExecutionError` if the column cannot be decoded.
pub fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<SqlValue, SqlMapperError> {
    let type_name = row.columns()[idx].type_().name();
    let value = match type_name {
        "int2" => row
            .try_get::<_, Option<i16>>(idx)
            .map(|v| v.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v)))),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)
            .map(|v| v.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v)))),
        "int8" => row
            .try_get::<_, Option<i64>>(idx)
            .map(|v| v.map_or(SqlValue::Null, SqlValue::Int)),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)
            .map(|v| v.map_or(SqlValue::Null, |v| SqlValue::Float(f64::from(v)))),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)
            .map(|v| v.map_or(SqlValue::Null, SqlValue::Float)),
        "bool" => row
            .try_get::<_, Option<bool>>(idx)
            .map(|v| v.map_or(SqlValue::Null, SqlValue::Bool)),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map(|v| v.map_or(SqlValue::Null, SqlValue::Timestamp)),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map(|v| v.map_or(SqlValue::Null, |v| SqlValue::Timestamp(v.naive_utc()))),
        "json" | "jsonb" => row
            .try_get::<_, Option<Value>>(idx)
            .map(|v| v.map_or(SqlValue::Null, SqlValue::Json)),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .map(|v| v.map_or(SqlValue::Null, SqlValue::Blob)),
        // text, varchar, bpchar, name; anything else is attempted as text
        _ => row
            .try_get::<_, Option<String>>(idx)
            .map(|v| v.map_or(SqlValue::Null, SqlValue::Text)),
    };
    value.map_err(|e| extract_error(idx, &e))
}

/// Build a result set using statement metadata for column names, so a query with zero rows
/// still reports its columns.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_result_set(
    stmt: &Statement,
    rows: &[tokio_postgres::Row],
) -> Result<ResultSet, SqlMapperError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(column_names, rows.len());
    for row in rows {
        let mut row_values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            row_values.push(postgres_extract_value(row, idx)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}
