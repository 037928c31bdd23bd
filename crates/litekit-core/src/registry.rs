//! Process-wide registry correlating database files with native connections
//!
//! The registry exists because the backup primitive needs the single physical
//! connection behind a pooled handle. Every new physical connection records
//! its resolved backing file here; the backup engine looks both sides up by
//! canonical path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use rusqlite::Connection;

static GLOBAL: OnceLock<Arc<ConnectionRegistry>> = OnceLock::new();

/// Maps canonical database paths to their most recent native connection.
///
/// Entries are non-owning: the registry holds a [`Weak`] reference, so a
/// connection's lifetime is never extended by this bookkeeping. A new
/// connection to the same path overwrites the prior entry (last writer wins).
/// If two logical databases are ever opened at canonicalized-equal paths
/// concurrently, the later connection wins and an in-flight backup may be
/// attributed to it; this is an accepted limitation of the last-writer-wins
/// scheme, not something the registry guards against.
///
/// Production code uses the shared [`ConnectionRegistry::global`] instance;
/// tests construct isolated registries with [`ConnectionRegistry::new`].
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<PathBuf, Weak<Mutex<Connection>>>>,
}

impl ConnectionRegistry {
    /// Create an isolated registry instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created at first use and never torn down.
    pub fn global() -> Arc<ConnectionRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ConnectionRegistry::new())))
    }

    /// Record `conn` as the live connection for `path`, overwriting any prior
    /// entry. Empty paths (memory databases have no backing file) are skipped.
    pub fn register(&self, path: &Path, conn: &Arc<Mutex<Connection>>) {
        if path.as_os_str().is_empty() {
            return;
        }
        let key = canonical(path);
        self.entries_lock().insert(key, Arc::downgrade(conn));
    }

    /// Look up the live connection registered for `path`.
    ///
    /// Returns `None` when no connection was ever registered for the
    /// canonicalized path, or when the registered connection has since closed.
    pub fn lookup(&self, path: &Path) -> Option<Arc<Mutex<Connection>>> {
        if path.as_os_str().is_empty() {
            return None;
        }
        let key = canonical(path);
        self.entries_lock().get(&key).and_then(Weak::upgrade)
    }

    // A poisoned map still holds valid entries; the paths and weak handles
    // written before the panic are intact, so recover instead of failing.
    fn entries_lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Weak<Mutex<Connection>>>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Canonical form of a database file location, used as the registry key.
///
/// Resolves symlinks when the file exists, and falls back to plain
/// absolutization otherwise, so distinct spellings of the same file collide.
pub fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
