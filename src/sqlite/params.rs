use rusqlite::types::Value;

use crate::error::SqlMapperError;
use crate::types::SqlValue;

/// Convert a single [`SqlValue`] to a rusqlite [`Value`].
///
/// `SQLite` has no boolean, timestamp or JSON storage class: booleans become 0/1, timestamps
/// ISO-8601 text, JSON its serialized text.
#[must_use]
pub fn sql_value_to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        SqlValue::Null => Value::Null,
        SqlValue::Json(json) => Value::Text(json.to_string()),
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Owned `SQLite` parameters, ready to move onto the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct Params(pub Vec<Value>);

impl Params {
    #[must_use]
    pub fn convert(params: &[SqlValue]) -> Self {
        Params(params.iter().map(sql_value_to_sqlite_value).collect())
    }

    #[must_use]
    pub fn as_values(&self) -> &[Value] {
        &self.0
    }
}

/// Bind `params` positionally, slot `i + 1` taking `params[i]`.
///
/// # Errors
/// Returns `SqlMapperError::BindingError` when the statement has a different number of slots.
pub fn bind_params(
    stmt: &mut rusqlite::Statement<'_>,
    params: &[Value],
) -> Result<(), SqlMapperError> {
    let expected = stmt.parameter_count();
    if expected != params.len() {
        return Err(SqlMapperError::BindingError(format!(
            "statement has {expected} parameter slot(s), {} value(s) supplied",
            params.len()
        )));
    }
    for (idx, value) in params.iter().enumerate() {
        stmt.raw_bind_parameter(idx + 1, value).map_err(|e| {
            SqlMapperError::BindingError(format!("cannot bind parameter {}: {e}", idx + 1))
        })?;
    }
    Ok(())
}
