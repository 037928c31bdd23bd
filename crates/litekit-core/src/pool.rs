//! Connection pool with thread-safe resource management
//!
//! Each slot is an `Arc<Mutex<Connection>>` rather than a bare connection so
//! the registry can hold a non-owning `Weak` to the same physical connection;
//! the pool remains the owner and the registry entry dies with the slot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::Connection;

use crate::driver::DriverConfig;
use crate::error::{Error, Result};
use crate::registry::ConnectionRegistry;

/// How long a connection waits on SQLite's own locks before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Slot = Arc<Mutex<Connection>>;

/// Fixed-size pool of physical connections to one database.
///
/// The first connection is established eagerly at construction, which both
/// verifies the target is openable and populates the connection registry.
/// Further connections are created on demand up to `pool_size`; exhaustion is
/// an error, not a wait.
pub struct ConnectionPool {
    available: Arc<Mutex<Vec<Slot>>>,
    target: String,
    driver: String,
    pool_size: usize,
    created: Mutex<usize>,
    config: Arc<DriverConfig>,
    registry: Arc<ConnectionRegistry>,
}

impl ConnectionPool {
    /// Create a pool for `target` (a path or `:memory:` form) and establish
    /// its first connection.
    pub(crate) fn new(
        target: String,
        driver: String,
        pool_size: usize,
        config: Arc<DriverConfig>,
        registry: Arc<ConnectionRegistry>,
    ) -> Result<Self> {
        let pool = Self {
            available: Arc::new(Mutex::new(Vec::with_capacity(pool_size))),
            target,
            driver,
            pool_size,
            created: Mutex::new(1),
            config,
            registry,
        };
        let first = pool.create_slot()?;
        lock_or_recover(&pool.available).push(first);
        Ok(pool)
    }

    /// Open a new physical connection and run the driver's connect sequence.
    fn create_slot(&self) -> Result<Slot> {
        let conn = Connection::open(&self.target).map_err(|source| Error::OpenFailed {
            target: self.target.clone(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|source| Error::OpenFailed {
                target: self.target.clone(),
                source,
            })?;

        let slot = Arc::new(Mutex::new(conn));
        self.config.establish(&self.driver, &slot, &self.registry)?;
        Ok(slot)
    }

    /// Get a connection from the pool, creating one if within limits.
    pub fn acquire(&self) -> Result<PooledConnection> {
        if let Some(slot) = lock_or_recover(&self.available).pop() {
            return Ok(PooledConnection::new(
                slot,
                Arc::clone(&self.available),
                self.pool_size,
            ));
        }

        {
            let mut created = self
                .created
                .lock()
                .map_err(|_| Error::LockPoisoned { detail: "pool counter" })?;
            if *created >= self.pool_size {
                return Err(Error::PoolExhausted {
                    active: *created,
                    max: self.pool_size,
                });
            }
            // Reserve the slot before opening so concurrent acquirers cannot
            // overshoot; the open itself runs outside the lock.
            *created += 1;
        }

        match self.create_slot() {
            Ok(slot) => Ok(PooledConnection::new(
                slot,
                Arc::clone(&self.available),
                self.pool_size,
            )),
            Err(e) => {
                if let Ok(mut created) = self.created.lock() {
                    *created -= 1;
                }
                Err(e)
            }
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub(crate) fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}

/// RAII wrapper that returns its connection slot to the pool on drop.
pub struct PooledConnection {
    slot: Option<Slot>,
    pool: Arc<Mutex<Vec<Slot>>>,
    pool_size: usize,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool_size", &self.pool_size)
            .finish_non_exhaustive()
    }
}

impl PooledConnection {
    fn new(slot: Slot, pool: Arc<Mutex<Vec<Slot>>>, pool_size: usize) -> Self {
        Self {
            slot: Some(slot),
            pool,
            pool_size,
        }
    }

    /// Lock the underlying connection for use.
    ///
    /// While checked out the only other contender for this lock is a backup
    /// session that found the same physical connection through the registry.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        lock_or_recover(self.shared())
    }

    /// The shared slot behind this checkout, as registered in the connection
    /// registry. Useful for identity comparisons against registry lookups.
    pub fn shared(&self) -> &Arc<Mutex<Connection>> {
        self.slot
            .as_ref()
            .expect("BUG: PooledConnection has None connection before drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            if let Ok(mut available) = self.pool.lock() {
                if available.len() < self.pool_size {
                    available.push(slot);
                } else {
                    tracing::warn!(
                        available = available.len(),
                        pool_size = self.pool_size,
                        "pool is full when returning connection"
                    );
                }
            } else {
                tracing::error!("failed to lock pool for connection return - connection dropped");
            }
        }
    }
}

// A poisoned slot or free-list still holds a consistent connection; the
// panicking holder's statement was finalized when its guard dropped.
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file_pool(pool_size: usize) -> (tempfile::TempDir, ConnectionPool) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.db");
        std::fs::File::create(&path).unwrap();
        let pool = ConnectionPool::new(
            path.to_string_lossy().into_owned(),
            "sqlite".to_string(),
            pool_size,
            Arc::new(DriverConfig::new()),
            Arc::new(ConnectionRegistry::new()),
        )
        .unwrap();
        (dir, pool)
    }

    #[test]
    fn test_acquire_and_return() {
        let (_dir, pool) = file_pool(2);

        let conn = pool.acquire().unwrap();
        conn.lock()
            .execute_batch("create table t (id integer)")
            .unwrap();
        drop(conn);

        // The returned slot is reused and sees the same database.
        let conn = pool.acquire().unwrap();
        let count: i64 = conn
            .lock()
            .query_row("select count(*) from t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_pool_exhaustion_is_an_error() {
        let (_dir, pool) = file_pool(2);

        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, Error::PoolExhausted { active: 2, max: 2 }));
    }

    #[test]
    fn test_slots_return_on_drop() {
        let (_dir, pool) = file_pool(1);

        for _ in 0..5 {
            let conn = pool.acquire().unwrap();
            let one: i64 = conn.lock().query_row("select 1", [], |row| row.get(0)).unwrap();
            assert_eq!(one, 1);
        }
    }
}
