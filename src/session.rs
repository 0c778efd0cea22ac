//! The execution engine.
//!
//! Every statement runs through the same sequence: compile the template, acquire a pooled
//! connection, resolve the bind value, execute, release. Materialization happens on the rows
//! the driver already returned, so the connection is back in the pool by then.

use std::fmt;
use std::sync::Arc;

use crate::binder::{BindValue, resolve_logged};
use crate::config::PoolConfig;
use crate::error::SqlMapperError;
use crate::mapper::MapperReturn;
use crate::materialize::{FromRow, materialize_all, materialize_one, materialize_optional};
use crate::pool::{ConnectionPool, PhysicalConnection};
use crate::results::ResultSet;
use crate::template::compile_with_style;
use crate::types::SqlValue;

/// What a statement does, and therefore whether it yields rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    Select,
}

impl OperationKind {
    /// Insert, update and delete run for effect.
    #[must_use]
    pub fn is_write(self) -> bool {
        !matches!(self, OperationKind::Select)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Select => "select",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw outcome of one statement, before materialization.
#[derive(Debug, Clone)]
pub enum StatementOutput {
    /// Rows affected by a write.
    Affected(usize),
    /// Rows produced by a select, in cursor order.
    Rows(ResultSet),
}

impl StatementOutput {
    #[must_use]
    pub fn affected(&self) -> Option<usize> {
        match self {
            StatementOutput::Affected(n) => Some(*n),
            StatementOutput::Rows(_) => None,
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::MappingError` for the outcome of a write.
    pub fn into_rows(self) -> Result<ResultSet, SqlMapperError> {
        match self {
            StatementOutput::Rows(rows) => Ok(rows),
            StatementOutput::Affected(_) => Err(SqlMapperError::MappingError(
                "a result was requested from a statement that produces no rows".into(),
            )),
        }
    }
}

/// Runs templated statements against a connection pool.
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Session {
    pool: Arc<ConnectionPool>,
}

impl Session {
    #[must_use]
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Build a private pool from `config` and wrap it.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` when no physical connection opens.
    pub async fn connect(config: &PoolConfig) -> Result<Self, SqlMapperError> {
        Ok(Self::new(ConnectionPool::connect(config).await?))
    }

    /// A session over the process-wide pool.
    ///
    /// # Errors
    /// See [`ConnectionPool::global`].
    pub async fn global() -> Result<Self, SqlMapperError> {
        Ok(Self::new(ConnectionPool::global().await?))
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Compile, acquire, bind, execute and release.
    ///
    /// The template is compiled on every call; nothing is cached between calls.
    ///
    /// # Errors
    /// `CompileError`, `SystemBusy`, `BindingError` or `ExecutionError` from the step that
    /// failed. The connection is released in every case. If this future is dropped mid-statement,
    /// the statement still runs to completion and the connection is released after it.
    pub async fn execute(
        &self,
        kind: OperationKind,
        template: &str,
        value: Option<&BindValue>,
    ) -> Result<StatementOutput, SqlMapperError> {
        let compiled = compile_with_style(template, self.pool.placeholder_style())?;
        let guard = self.pool.acquire().await?;
        let params = resolve_logged(value, compiled.param_names())?;

        tracing::debug!(
            %kind,
            sql = compiled.text(),
            params = params.len(),
            connection = guard.id(),
            "executing statement"
        );
        // The guard travels with the statement: if the caller stops waiting, the slot stays
        // busy until the driver has finished with the connection.
        let output = tokio::spawn(async move {
            let output = dispatch(guard.physical(), kind, compiled.text(), &params).await;
            guard.release();
            output
        })
        .await
        .map_err(join_error)?;

        if let Err(err) = &output {
            tracing::debug!(%kind, error = %err, "statement failed");
        }
        output
    }

    /// Execute and convert the outcome into `R`.
    ///
    /// # Errors
    /// Everything [`Session::execute`] returns, plus `MappingError` when the outcome does not fit
    /// `R`.
    pub async fn execute_as<R: MapperReturn>(
        &self,
        kind: OperationKind,
        template: &str,
        value: Option<&BindValue>,
    ) -> Result<R, SqlMapperError> {
        let output = self.execute(kind, template, value).await?;
        R::from_output(output)
    }

    /// Run an insert and return the number of rows it affected.
    ///
    /// # Errors
    /// See [`Session::execute`].
    pub async fn insert(
        &self,
        template: &str,
        value: Option<BindValue>,
    ) -> Result<usize, SqlMapperError> {
        self.execute_as(OperationKind::Insert, template, value.as_ref())
            .await
    }

    /// Run an update and return the number of rows it affected.
    ///
    /// # Errors
    /// See [`Session::execute`].
    pub async fn update(
        &self,
        template: &str,
        value: Option<BindValue>,
    ) -> Result<usize, SqlMapperError> {
        self.execute_as(OperationKind::Update, template, value.as_ref())
            .await
    }

    /// Run a delete and return the number of rows it affected.
    ///
    /// # Errors
    /// See [`Session::execute`].
    pub async fn delete(
        &self,
        template: &str,
        value: Option<BindValue>,
    ) -> Result<usize, SqlMapperError> {
        self.execute_as(OperationKind::Delete, template, value.as_ref())
            .await
    }

    /// First row of a select.
    ///
    /// # Errors
    /// `MappingError` when the select returns no rows, otherwise see [`Session::execute`].
    pub async fn select_one<T: FromRow>(
        &self,
        template: &str,
        value: Option<BindValue>,
    ) -> Result<T, SqlMapperError> {
        let rows = self
            .execute(OperationKind::Select, template, value.as_ref())
            .await?
            .into_rows()?;
        materialize_one(&rows)
    }

    /// First row of a select, or `None` when there is none.
    ///
    /// # Errors
    /// See [`Session::execute`].
    pub async fn select_optional<T: FromRow>(
        &self,
        template: &str,
        value: Option<BindValue>,
    ) -> Result<Option<T>, SqlMapperError> {
        let rows = self
            .execute(OperationKind::Select, template, value.as_ref())
            .await?
            .into_rows()?;
        materialize_optional(&rows)
    }

    /// Every row of a select, in result order.
    ///
    /// # Errors
    /// See [`Session::execute`].
    pub async fn select_list<T: FromRow>(
        &self,
        template: &str,
        value: Option<BindValue>,
    ) -> Result<Vec<T>, SqlMapperError> {
        let rows = self
            .execute(OperationKind::Select, template, value.as_ref())
            .await?
            .into_rows()?;
        materialize_all(&rows)
    }

    /// Run unparameterized SQL, possibly several `;`-separated statements (DDL, seed data).
    ///
    /// # Errors
    /// `SystemBusy` or `ExecutionError`.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlMapperError> {
        let guard = self.pool.acquire().await?;
        tracing::debug!(connection = guard.id(), "executing batch");
        let sql = sql.to_owned();
        tokio::spawn(async move {
            let result = match guard.physical() {
                #[cfg(feature = "sqlite")]
                PhysicalConnection::Sqlite(conn) => {
                    crate::sqlite::execute_batch(conn, &sql).await
                }
                #[cfg(feature = "postgres")]
                PhysicalConnection::Postgres(client) => {
                    crate::postgres::execute_batch(client, &sql).await
                }
                #[allow(unreachable_patterns)]
                _ => Err(unsupported()),
            };
            guard.release();
            result
        })
        .await
        .map_err(join_error)?
    }
}

async fn dispatch(
    conn: &PhysicalConnection,
    kind: OperationKind,
    sql: &str,
    params: &[SqlValue],
) -> Result<StatementOutput, SqlMapperError> {
    match conn {
        #[cfg(feature = "sqlite")]
        PhysicalConnection::Sqlite(conn) => {
            if kind.is_write() {
                crate::sqlite::execute_dml(conn, sql, params)
                    .await
                    .map(StatementOutput::Affected)
            } else {
                crate::sqlite::execute_select(conn, sql, params)
                    .await
                    .map(StatementOutput::Rows)
            }
        }
        #[cfg(feature = "postgres")]
        PhysicalConnection::Postgres(client) => {
            if kind.is_write() {
                crate::postgres::execute_dml(client, sql, params)
                    .await
                    .map(StatementOutput::Affected)
            } else {
                crate::postgres::execute_select(client, sql, params)
                    .await
                    .map(StatementOutput::Rows)
            }
        }
        #[allow(unreachable_patterns)]
        _ => Err(unsupported()),
    }
}

fn join_error(err: tokio::task::JoinError) -> SqlMapperError {
    SqlMapperError::ExecutionError(format!("statement task join error: {err}"))
}

fn unsupported() -> SqlMapperError {
    SqlMapperError::Unimplemented(
        "This database type is not enabled in the current build".to_string(),
    )
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::collections::HashMap;

    use super::*;

    async fn session(dir: &tempfile::TempDir, size: usize) -> Session {
        let path = dir.path().join("session.db");
        let session = Session::connect(&PoolConfig::sqlite(path.to_str().unwrap(), size, 1))
            .await
            .unwrap();
        session
            .execute_batch("create table kv (k text primary key, v integer);")
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn direct_operations_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir, 2).await;

        let inserted = session
            .insert(
                "insert into kv (k, v) values (#{k}, #{v})",
                Some(BindValue::map([("k", SqlValue::from("a")), ("v", SqlValue::Int(1))])),
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let v: i64 = session
            .select_one("select v from kv where k = #{k}", Some("a".into()))
            .await
            .unwrap();
        assert_eq!(v, 1);

        let updated = session
            .update("update kv set v = v + 1", None)
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let all: Vec<HashMap<String, SqlValue>> =
            session.select_list("select * from kv", None).await.unwrap();
        assert_eq!(all[0]["v"], SqlValue::Int(2));

        let deleted = session
            .delete("delete from kv where k = #{k}", Some("a".into()))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        let gone: Option<i64> = session
            .select_optional("select v from kv where k = #{k}", Some("a".into()))
            .await
            .unwrap();
        assert_eq!(gone, None);
    }

    #[tokio::test]
    async fn failures_release_the_connection() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir, 1).await;

        let err = session
            .insert("insert into missing values (#{x})", Some(1_i64.into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::ExecutionError(_)));
        assert_eq!(session.pool().busy_count(), 0);

        let err = session
            .insert("insert into kv (k, v) values (#{k}, #{v})", Some("only-one".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::BindingError(_)));
        assert_eq!(session.pool().busy_count(), 0);

        let err = session
            .select_one::<i64>("select v from kv where k = #{k", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::CompileError(_)));
    }

    #[tokio::test]
    async fn select_one_on_empty_is_a_mapping_error() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir, 1).await;
        let err = session
            .select_one::<i64>("select v from kv", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::MappingError(_)));
        assert!(session.select_list::<i64>("select v from kv", None).await.unwrap().is_empty());
    }

    #[test]
    fn rows_are_not_an_affected_count() {
        let output = StatementOutput::Rows(ResultSet::new(vec!["a".into()]));
        assert_eq!(output.affected(), None);
        assert!(StatementOutput::Affected(3).into_rows().is_err());
        assert_eq!(OperationKind::Delete.to_string(), "delete");
        assert!(!OperationKind::Select.is_write());
    }
}
