use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::SqlMapperError;

/// A rusqlite connection shared between the async side and the blocking pool.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// How long `SQLite` itself retries a locked database before reporting `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts a bare path, `:memory:`, a `file:` URI, or the same behind `sqlite://`/`sqlite:`.
fn database_path(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

/// Open one physical `SQLite` connection and switch it to WAL.
///
/// # Errors
/// Returns `SqlMapperError::ConnectionError` if the database cannot be opened or configured.
pub async fn open_connection(url: &str) -> Result<SharedSqliteConnection, SqlMapperError> {
    let path = database_path(url).to_owned();
    let conn = tokio::task::spawn_blocking(move || -> Result<_, SqlMapperError> {
        let conn = rusqlite::Connection::open(&path).map_err(|e| {
            SqlMapperError::ConnectionError(format!("Failed to open SQLite database {path}: {e}"))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(|e| {
            SqlMapperError::ConnectionError(format!("Failed to set SQLite busy timeout: {e}"))
        })?;
        // journal_mode answers with a row; in-memory databases report "memory"
        let mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| {
                SqlMapperError::ConnectionError(format!("Failed to enable WAL on {path}: {e}"))
            })?;
        tracing::debug!(path = %path, journal_mode = %mode, "opened sqlite connection");
        Ok(conn)
    })
    .await
    .map_err(|e| SqlMapperError::ConnectionError(format!("sqlite open join error: {e}")))??;

    Ok(Arc::new(Mutex::new(conn)))
}

/// Run `func` against the connection on tokio's blocking pool.
pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, SqlMapperError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlMapperError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlMapperError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}
