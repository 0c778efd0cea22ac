use tokio_postgres::{Client, Statement};

use crate::error::SqlMapperError;
use crate::results::ResultSet;
use crate::types::SqlValue;

use super::params::Params;
use super::query::build_result_set;

async fn prepare_checked(
    client: &Client,
    query: &str,
    params: &[SqlValue],
) -> Result<Statement, SqlMapperError> {
    let stmt = client
        .prepare(query)
        .await
        .map_err(|e| SqlMapperError::ExecutionError(format!("postgres prepare error: {e}")))?;
    if stmt.params().len() != params.len() {
        return Err(SqlMapperError::BindingError(format!(
            "statement has {} parameter slot(s), {} value(s) supplied",
            stmt.params().len(),
            params.len()
        )));
    }
    Ok(stmt)
}

/// Execute a batch of SQL statements.
///
/// The simple-query protocol runs a multi-statement string as one implicit transaction.
///
/// # Errors
/// Returns `SqlMapperError::ExecutionError` if any statement fails.
pub async fn execute_batch(client: &Client, query: &str) -> Result<(), SqlMapperError> {
    client
        .batch_execute(query)
        .await
        .map_err(|e| SqlMapperError::ExecutionError(format!("postgres batch error: {e}")))
}

/// Execute a SELECT query with parameters.
///
/// # Errors
/// Returns `SqlMapperError::BindingError` on a slot mismatch and `ExecutionError` when
/// preparation, execution or decoding fails.
pub async fn execute_select(
    client: &Client,
    query: &str,
    params: &[SqlValue],
) -> Result<ResultSet, SqlMapperError> {
    let stmt = prepare_checked(client, query, params).await?;
    let converted = Params::convert(params);
    let rows = client
        .query(&stmt, converted.as_refs())
        .await
        .map_err(|e| SqlMapperError::ExecutionError(format!("postgres select error: {e}")))?;
    build_result_set(&stmt, &rows)
}

/// Execute a DML query (INSERT, UPDATE, DELETE) with parameters.
///
/// # Errors
/// Returns `SqlMapperError::BindingError` on a slot mismatch and `ExecutionError` when
/// preparation or execution fails.
pub async fn execute_dml(
    client: &Client,
    query: &str,
    params: &[SqlValue],
) -> Result<usize, SqlMapperError> {
    let stmt = prepare_checked(client, query, params).await?;
    let converted = Params::convert(params);
    let rows = client
        .execute(&stmt, converted.as_refs())
        .await
        .map_err(|e| SqlMapperError::ExecutionError(format!("postgres execute error: {e}")))?;
    usize::try_from(rows).map_err(|e| {
        SqlMapperError::ExecutionError(format!("postgres affected rows conversion error: {e}"))
    })
}
