use std::sync::Arc;

use crate::error::SqlMapperError;
use crate::results::ResultSet;
use crate::types::SqlValue;

use super::config::{SharedSqliteConnection, run_blocking};
use super::params::{Params, bind_params};
use super::query::build_result_set;

fn execution_error(context: &str, err: &rusqlite::Error) -> SqlMapperError {
    SqlMapperError::ExecutionError(format!("sqlite {context} error: {err}"))
}

/// Execute a batch of SQL statements, wrapped in a transaction when the connection is in
/// auto-commit mode.
///
/// # Errors
/// Returns `SqlMapperError::ExecutionError` if any statement fails; the batch is rolled back.
pub async fn execute_batch(
    conn: &SharedSqliteConnection,
    query: &str,
) -> Result<(), SqlMapperError> {
    let sql_owned = query.to_owned();
    run_blocking(Arc::clone(conn), move |guard| {
        if guard.is_autocommit() {
            let tx = guard
                .transaction()
                .map_err(|e| execution_error("begin", &e))?;
            tx.execute_batch(&sql_owned)
                .map_err(|e| execution_error("batch", &e))?;
            tx.commit().map_err(|e| execution_error("commit", &e))
        } else {
            guard
                .execute_batch(&sql_owned)
                .map_err(|e| execution_error("batch", &e))
        }
    })
    .await
}

/// Execute a SELECT and collect its rows.
///
/// # Errors
/// Returns `SqlMapperError::BindingError` on a slot mismatch and `ExecutionError` when
/// preparing or stepping the statement fails.
pub async fn execute_select(
    conn: &SharedSqliteConnection,
    query: &str,
    params: &[SqlValue],
) -> Result<ResultSet, SqlMapperError> {
    let sql_owned = query.to_owned();
    let params_owned = Params::convert(params);
    run_blocking(Arc::clone(conn), move |guard| {
        let mut stmt = guard
            .prepare_cached(&sql_owned)
            .map_err(|e| execution_error("prepare", &e))?;
        build_result_set(&mut stmt, params_owned.as_values())
    })
    .await
}

/// Execute a DML statement (INSERT, UPDATE, DELETE) and return rows affected.
///
/// # Errors
/// Returns `SqlMapperError::BindingError` on a slot mismatch and `ExecutionError` when the
/// statement fails.
pub async fn execute_dml(
    conn: &SharedSqliteConnection,
    query: &str,
    params: &[SqlValue],
) -> Result<usize, SqlMapperError> {
    let sql_owned = query.to_owned();
    let params_owned = Params::convert(params);
    run_blocking(Arc::clone(conn), move |guard| {
        let mut stmt = guard
            .prepare_cached(&sql_owned)
            .map_err(|e| execution_error("prepare", &e))?;
        bind_params(&mut stmt, params_owned.as_values())?;
        stmt.raw_execute().map_err(|e| execution_error("dml", &e))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::open_connection;

    #[tokio::test]
    async fn dml_then_select() {
        let conn = open_connection(":memory:").await.unwrap();
        execute_batch(&conn, "create table t (id integer, name text, score real);")
            .await
            .unwrap();

        let affected = execute_dml(
            &conn,
            "insert into t values (?, ?, ?), (?, ?, ?)",
            &[
                SqlValue::Int(1),
                SqlValue::Text("a".into()),
                SqlValue::Float(1.5),
                SqlValue::Int(2),
                SqlValue::Null,
                SqlValue::Bool(true),
            ],
        )
        .await
        .unwrap();
        assert_eq!(affected, 2);

        let rs = execute_select(&conn, "select id, name, score from t order by id", &[])
            .await
            .unwrap();
        assert_eq!(rs.column_names(), &["id", "name", "score"]);
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.rows()[0].get("name"), Some(&SqlValue::Text("a".into())));
        assert_eq!(rs.rows()[1].get("name"), Some(&SqlValue::Null));
        assert_eq!(rs.rows()[1].get("score"), Some(&SqlValue::Float(1.0)));
    }

    #[tokio::test]
    async fn failed_batch_rolls_back() {
        let conn = open_connection(":memory:").await.unwrap();
        execute_batch(&conn, "create table t (id integer primary key);")
            .await
            .unwrap();
        let err = execute_batch(&conn, "insert into t values (1); insert into t values (1);")
            .await
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::ExecutionError(_)));

        let rs = execute_select(&conn, "select count(*) from t", &[]).await.unwrap();
        assert_eq!(rs.rows()[0].get_by_index(0), Some(&SqlValue::Int(0)));
    }

    #[tokio::test]
    async fn bad_sql_is_an_execution_error() {
        let conn = open_connection(":memory:").await.unwrap();
        let err = execute_dml(&conn, "insert into nowhere values (?)", &[SqlValue::Int(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::ExecutionError(_)));
    }
}
