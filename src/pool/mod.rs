//! Fixed-size connection pool.
//!
//! The pool opens `min_connect_count` physical connections up front and never grows, shrinks
//! or replaces them. Callers claim a free slot, and waiting callers poll every
//! [`POLL_INTERVAL`] until the configured wait budget runs out.

mod connection;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;

pub use connection::{PhysicalConnection, PooledConnection, PooledGuard};

use crate::config::{self, PoolConfig};
use crate::error::SqlMapperError;
use crate::template::PlaceholderStyle;
use crate::types::DatabaseType;

/// Sleep between two full scans of the pool while waiting for a free slot.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

static GLOBAL_POOL: OnceCell<Arc<ConnectionPool>> = OnceCell::const_new();

#[derive(Debug)]
pub struct ConnectionPool {
    connections: Vec<Arc<PooledConnection>>,
    database_type: DatabaseType,
    wait_time_secs: u64,
}

impl ConnectionPool {
    /// Open every physical connection described by `config`.
    ///
    /// A connection that fails to open is logged and left out of the pool.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` if no connection at all could be opened.
    pub async fn connect(config: &PoolConfig) -> Result<Arc<Self>, SqlMapperError> {
        let mut connections = Vec::with_capacity(config.min_connect_count);
        let mut last_error = None;
        for attempt in 0..config.min_connect_count {
            match open_physical(config).await {
                Ok(physical) => {
                    let id = connections.len();
                    connections.push(Arc::new(PooledConnection::new(id, physical)));
                }
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        url = %config.url,
                        error = %err,
                        "failed to open physical connection; continuing without it"
                    );
                    last_error = Some(err);
                }
            }
        }

        if connections.is_empty() {
            return Err(SqlMapperError::ConnectionError(format!(
                "no connection could be opened to {}: {}",
                config.url,
                last_error.map_or_else(|| "pool size is zero".to_string(), |e| e.to_string())
            )));
        }

        tracing::debug!(
            size = connections.len(),
            requested = config.min_connect_count,
            database = ?config.database_type,
            "connection pool ready"
        );
        Ok(Arc::new(Self::from_connections(
            connections,
            config.database_type,
            config.wait_time_secs,
        )))
    }

    pub(crate) fn from_connections(
        connections: Vec<Arc<PooledConnection>>,
        database_type: DatabaseType,
        wait_time_secs: u64,
    ) -> Self {
        Self {
            connections,
            database_type,
            wait_time_secs,
        }
    }

    /// The process-wide pool, built from [`config::global`] on first use.
    ///
    /// Concurrent first callers wait for a single construction; a failed construction is not
    /// cached, so a later call tries again.
    ///
    /// # Errors
    /// Returns configuration or connection errors from the first construction.
    pub async fn global() -> Result<Arc<Self>, SqlMapperError> {
        GLOBAL_POOL
            .get_or_try_init(|| async {
                let config = config::global()?;
                Self::connect(config).await
            })
            .await
            .map(Arc::clone)
    }

    /// Claim a free connection, waiting up to the configured budget.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SystemBusy` when no connection frees up within
    /// `wait_time_secs * 10` polls.
    pub async fn acquire(&self) -> Result<PooledGuard, SqlMapperError> {
        if let Some(guard) = self.claim_free() {
            return Ok(guard);
        }

        let max_polls = self.wait_time_secs.saturating_mul(10);
        for _ in 0..max_polls {
            tokio::time::sleep(POLL_INTERVAL).await;
            if let Some(guard) = self.claim_free() {
                return Ok(guard);
            }
        }

        tracing::warn!(
            size = self.size(),
            wait_time_secs = self.wait_time_secs,
            "no pooled connection became free"
        );
        Err(SqlMapperError::SystemBusy(format!(
            "all {} connections stayed busy for {}s, try again later",
            self.size(),
            self.wait_time_secs
        )))
    }

    /// One pass over the slots.
    fn claim_free(&self) -> Option<PooledGuard> {
        for conn in &self.connections {
            if conn.is_busy() {
                continue;
            }
            if conn.try_claim() {
                tracing::debug!(connection = conn.id(), "claimed pooled connection");
                return Some(PooledGuard::new(Arc::clone(conn)));
            }
        }
        None
    }

    /// Number of physical connections.
    #[must_use]
    pub fn size(&self) -> usize {
        self.connections.len()
    }

    /// Connections currently claimed.
    #[must_use]
    pub fn busy_count(&self) -> usize {
        self.connections.iter().filter(|c| c.is_busy()).count()
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    #[must_use]
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs)
    }

    /// Marker style the backend expects in prepared statements.
    #[must_use]
    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self.database_type {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => PlaceholderStyle::Numbered,
            #[allow(unreachable_patterns)]
            _ => PlaceholderStyle::Question,
        }
    }
}

async fn open_physical(config: &PoolConfig) -> Result<PhysicalConnection, SqlMapperError> {
    match config.database_type {
        #[cfg(feature = "sqlite")]
        DatabaseType::Sqlite => crate::sqlite::open_connection(&config.url)
            .await
            .map(PhysicalConnection::Sqlite),
        #[cfg(feature = "postgres")]
        DatabaseType::Postgres => {
            crate::postgres::open_connection(&config.url, &config.user, &config.password)
                .await
                .map(PhysicalConnection::Postgres)
        }
        #[allow(unreachable_patterns)]
        _ => Err(SqlMapperError::Unimplemented(
            "This database type is not enabled in the current build".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use super::*;

    async fn memory_pool(size: usize, wait_time_secs: u64) -> Arc<ConnectionPool> {
        let mut connections = Vec::new();
        for id in 0..size {
            let conn = crate::sqlite::open_connection(":memory:").await.unwrap();
            connections.push(Arc::new(PooledConnection::new(
                id,
                PhysicalConnection::Sqlite(conn),
            )));
        }
        Arc::new(ConnectionPool::from_connections(
            connections,
            DatabaseType::Sqlite,
            wait_time_secs,
        ))
    }

    #[tokio::test]
    async fn claims_distinct_connections() {
        let pool = memory_pool(2, 0).await;
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(pool.busy_count(), 2);
        a.release();
        assert_eq!(pool.busy_count(), 1);
        drop(b);
        assert_eq!(pool.busy_count(), 0);
    }

    #[tokio::test]
    async fn zero_wait_fails_immediately_when_exhausted() {
        let pool = memory_pool(1, 0).await;
        let _held = pool.acquire().await.unwrap();
        let started = Instant::now();
        let err = pool.acquire().await.unwrap_err();
        assert!(err.is_system_busy());
        assert!(started.elapsed() < POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_wait_budget() {
        let pool = memory_pool(1, 2).await;
        let _held = pool.acquire().await.unwrap();
        let started = tokio::time::Instant::now();
        let err = pool.acquire().await.unwrap_err();
        assert!(err.is_system_busy());
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(2) + POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_gets_released_connection() {
        let pool = memory_pool(1, 5).await;
        let held = pool.acquire().await.unwrap();
        let held_id = held.id();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await.map(|g| g.id()) })
        };
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(!waiter.is_finished());
        drop(held);

        assert_eq!(waiter.await.unwrap().unwrap(), held_id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_hands_out_a_connection_twice() {
        let pool = memory_pool(3, 5).await;
        let in_use: Arc<Vec<AtomicUsize>> =
            Arc::new((0..3).map(|_| AtomicUsize::new(0)).collect());
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..12 {
            let pool = Arc::clone(&pool);
            let in_use = Arc::clone(&in_use);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                for _ in 0..5 {
                    let guard = pool.acquire().await.unwrap();
                    let holders = in_use[guard.id()].fetch_add(1, Ordering::SeqCst);
                    assert_eq!(holders, 0, "connection {} shared", guard.id());
                    peak.fetch_max(pool.busy_count(), Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    in_use[guard.id()].fetch_sub(1, Ordering::SeqCst);
                    drop(guard);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.busy_count(), 0);
    }
}
