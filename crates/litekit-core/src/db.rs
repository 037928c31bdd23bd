//! The logical database handle
//!
//! A [`Database`] is a cheaply clonable facade over one connection pool. It
//! carries the two primitives the access broker wraps (execute a statement,
//! stream the rows of a query) plus the metadata queries the backup engine
//! shares with connection establishment.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::Params;

use crate::error::{BoxError, Error, Result};
use crate::open::OpenOptions;
use crate::pool::{ConnectionPool, PooledConnection};
use crate::registry::ConnectionRegistry;

/// Per-row callback for [`Database::stream`]: column names, row index, values.
/// Returning an error stops streaming early and propagates to the caller.
pub type RowFn<'a> =
    &'a mut dyn FnMut(&[String], usize, &[Value]) -> std::result::Result<(), BoxError>;

/// A handle to one open database, backed by a connection pool.
#[derive(Clone)]
pub struct Database {
    pool: Arc<ConnectionPool>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open `target` with default options.
    pub fn open(target: impl AsRef<str>) -> Result<Self> {
        OpenOptions::new().open(target)
    }

    pub(crate) fn from_pool(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Borrow a pooled connection for direct use.
    pub fn acquire(&self) -> Result<PooledConnection> {
        self.pool.acquire()
    }

    pub(crate) fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(self.pool.registry())
    }

    /// Execute one mutating statement, returning the last inserted row id and
    /// the number of affected rows.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<(i64, usize)> {
        let conn = self.pool.acquire()?;
        let guard = conn.lock();
        let affected = guard.execute(sql, params).map_err(|source| Error::Statement {
            sql: sql.to_string(),
            source,
        })?;
        Ok((guard.last_insert_rowid(), affected))
    }

    /// Execute a batch of statements with no results expected.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.pool.acquire()?;
        let guard = conn.lock();
        guard.execute_batch(sql).map_err(|source| Error::Statement {
            sql: sql.to_string(),
            source,
        })
    }

    /// Run a query and hand each row to `row_fn` as (columns, index, values).
    pub fn stream<P: Params>(&self, row_fn: RowFn<'_>, sql: &str, params: P) -> Result<()> {
        let conn = self.pool.acquire()?;
        let guard = conn.lock();

        let mut stmt = guard.prepare(sql).map_err(|source| Error::Statement {
            sql: sql.to_string(),
            source,
        })?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt.query(params).map_err(|source| Error::Statement {
            sql: sql.to_string(),
            source,
        })?;

        let mut index = 0;
        loop {
            let row = rows.next().map_err(|source| Error::Statement {
                sql: sql.to_string(),
                source,
            })?;
            let Some(row) = row else { break };

            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let value: Value = row.get(i).map_err(|source| Error::Statement {
                    sql: sql.to_string(),
                    source,
                })?;
                values.push(value);
            }

            row_fn(&columns, index, &values)
                .map_err(|source| Error::RowCallback { row: index, source })?;
            index += 1;
        }
        Ok(())
    }

    /// The resolved backing file of this database, via the same metadata query
    /// used at connection time. `None` for memory databases.
    pub fn filename(&self) -> Result<Option<PathBuf>> {
        let conn = self.pool.acquire()?;
        let guard = conn.lock();
        let file =
            crate::driver::connection_filename(&guard).map_err(|source| Error::Statement {
                sql: "PRAGMA database_list".to_string(),
                source,
            })?;
        Ok(file.map(PathBuf::from))
    }

    /// The schema change counter (`PRAGMA data_version`).
    pub fn data_version(&self) -> Result<i64> {
        let conn = self.pool.acquire()?;
        let guard = conn.lock();
        guard
            .query_row("PRAGMA data_version", [], |row| row.get(0))
            .map_err(|source| Error::Statement {
                sql: "PRAGMA data_version".to_string(),
                source,
            })
    }

    /// Checkpoint the write-ahead log and release this handle.
    ///
    /// Failures are logged, not propagated: the handle is going away either
    /// way, and the checkpoint is an opportunistic tidy-up.
    pub fn close(self) {
        match self.pool.acquire() {
            Ok(conn) => {
                let guard = conn.lock();
                if let Err(e) =
                    guard.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
                {
                    tracing::warn!(error = %e, "error executing WAL checkpoint");
                }
            }
            Err(e) => tracing::warn!(error = %e, "no connection available for close checkpoint"),
        }
    }
}

/// The version of the SQLite library in use, as (version string, number).
pub fn version() -> (&'static str, i32) {
    (rusqlite::version(), rusqlite::version_number())
}
