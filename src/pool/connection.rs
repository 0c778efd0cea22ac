use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(feature = "sqlite")]
use crate::sqlite::SharedSqliteConnection;
#[cfg(feature = "postgres")]
use tokio_postgres::Client as PostgresClient;

/// The driver-level connection owned by one pool slot.
pub enum PhysicalConnection {
    #[cfg(feature = "sqlite")]
    Sqlite(SharedSqliteConnection),
    #[cfg(feature = "postgres")]
    Postgres(PostgresClient),
}

impl fmt::Debug for PhysicalConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => f.debug_tuple("Sqlite").field(&"<rusqlite::Connection>").finish(),
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => f
                .debug_tuple("Postgres")
                .field(&"<tokio_postgres::Client>")
                .finish(),
            #[allow(unreachable_patterns)]
            _ => f.write_str("PhysicalConnection"),
        }
    }
}

/// One pool slot: a physical connection plus its busy flag.
///
/// Slots live as long as the pool. The flag may be read without the slot lock (the scan in
/// [`super::ConnectionPool::acquire`] does), but it only changes while the lock is held.
pub struct PooledConnection {
    id: usize,
    physical: PhysicalConnection,
    busy: AtomicBool,
    claim_lock: Mutex<()>,
}

impl PooledConnection {
    pub(crate) fn new(id: usize, physical: PhysicalConnection) -> Self {
        Self {
            id,
            physical,
            busy: AtomicBool::new(false),
            claim_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Unsynchronized peek at the flag; may be stale by the time the caller acts on it.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub(crate) fn physical(&self) -> &PhysicalConnection {
        &self.physical
    }

    /// Free → Busy under the slot lock. Returns `false` if another caller got there first.
    pub(crate) fn try_claim(&self) -> bool {
        let _slot = self.lock_slot();
        // Re-check: several callers may have seen this slot free during the scan.
        if self.busy.load(Ordering::Acquire) {
            return false;
        }
        self.busy.store(true, Ordering::Release);
        true
    }

    /// Busy → Free. The physical connection stays open.
    pub(crate) fn release(&self) {
        let _slot = self.lock_slot();
        self.busy.store(false, Ordering::Release);
    }

    fn lock_slot(&self) -> MutexGuard<'_, ()> {
        match self.claim_lock.lock() {
            Ok(guard) => guard,
            // The guarded data is `()`, nothing to repair
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("physical", &self.physical)
            .field("busy", &self.is_busy())
            .finish()
    }
}

/// A claimed pool slot. Dropping it (or calling [`PooledGuard::release`]) returns the slot to
/// the pool, so every exit path releases.
pub struct PooledGuard {
    conn: Arc<PooledConnection>,
}

impl PooledGuard {
    pub(crate) fn new(conn: Arc<PooledConnection>) -> Self {
        Self { conn }
    }

    /// Id of the claimed slot.
    #[must_use]
    pub fn id(&self) -> usize {
        self.conn.id()
    }

    #[must_use]
    pub fn physical(&self) -> &PhysicalConnection {
        self.conn.physical()
    }

    /// Give the connection back to the pool ("close" from the caller's side).
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PooledGuard {
    fn drop(&mut self) {
        self.conn.release();
        tracing::debug!(connection = self.conn.id(), "released pooled connection");
    }
}

impl fmt::Debug for PooledGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledGuard")
            .field("connection", &self.conn.id())
            .finish()
    }
}
