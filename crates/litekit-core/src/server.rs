//! Single-writer/multi-reader access broker
//!
//! The broker layers an advisory readers-writer discipline over one database
//! handle: writes are fully serialized, reads run concurrently with each
//! other but never with a write. It does not replace the engine's own
//! locking or transaction isolation; it keeps this process's concurrent
//! callers from racing each other on the shared handle.

use std::sync::{PoisonError, RwLock};

use rusqlite::Params;

use crate::db::{Database, RowFn};
use crate::error::Result;

/// Serializes mutating access to one database handle.
///
/// Contention is a blocking wait, never an error. There is no retry, backoff,
/// or queueing beyond the lock's native fairness; a long-running stream can
/// hold off a pending exec and vice versa.
pub struct Server {
    db: Database,
    lock: RwLock<()>,
}

impl Server {
    /// Wrap an open handle in a broker.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            lock: RwLock::new(()),
        }
    }

    /// Execute a mutating statement under exclusive access.
    ///
    /// Returns the last inserted row id and the number of affected rows.
    pub fn exec<P: Params>(&self, sql: &str, params: P) -> Result<(i64, usize)> {
        let _excl = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        self.db.execute(sql, params)
    }

    /// Stream query results to `row_fn` under shared access.
    ///
    /// The callback receives (column names, row index, row values); returning
    /// an error stops streaming early and propagates it.
    pub fn stream<P: Params>(&self, row_fn: RowFn<'_>, sql: &str, params: P) -> Result<()> {
        let _shared = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        self.db.stream(row_fn, sql, params)
    }

    /// The wrapped handle, for operations outside the broker's discipline.
    pub fn database(&self) -> &Database {
        &self.db
    }
}
