//! Opening databases through the driver-initialization path
//!
//! Every open routes through [`crate::driver::initialize`] so that registry
//! population happens as a side effect of connection establishment; nothing
//! else in the crate opens raw connections to user databases.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::db::Database;
use crate::driver::{self, DriverConfig, Hook, ScalarFunc, DEFAULT_DRIVER};
use crate::error::{Error, Result};
use crate::pool::ConnectionPool;
use crate::registry::ConnectionRegistry;

/// Default number of pooled connections per database handle.
const DEFAULT_POOL_SIZE: usize = 5;

/// Options for opening a database.
///
/// ```no_run
/// use litekit_core::OpenOptions;
///
/// let db = OpenOptions::new()
///     .with_exists(true)
///     .with_query("PRAGMA journal_mode = WAL;")
///     .open("state/app.db")?;
/// # Ok::<(), litekit_core::Error>(())
/// ```
#[derive(Default)]
pub struct OpenOptions {
    driver: Option<String>,
    fail_if_missing: bool,
    startup_query: Option<String>,
    hook: Option<Hook>,
    functions: Vec<ScalarFunc>,
    pool_size: Option<usize>,
    registry: Option<Arc<ConnectionRegistry>>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical driver name to register the configuration under.
    ///
    /// Driver registration is first-wins per process: if this name was already
    /// initialized, the query/hook/functions on this builder are discarded in
    /// favor of the earlier configuration.
    pub fn with_driver(mut self, name: impl Into<String>) -> Self {
        self.driver = Some(name.into());
        self
    }

    /// Fail the open when the database file does not already exist.
    pub fn with_exists(mut self, fail_if_missing: bool) -> Self {
        self.fail_if_missing = fail_if_missing;
        self
    }

    /// SQL executed on every new physical connection.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.startup_query = Some(query.into());
        self
    }

    /// Hook invoked on every new physical connection.
    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Custom scalar functions registered on every new physical connection.
    pub fn with_functions(mut self, functions: Vec<ScalarFunc>) -> Self {
        self.functions = functions;
        self
    }

    /// Number of pooled connections (memory databases are capped at one,
    /// since each new memory connection would be a distinct database).
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    /// Use an isolated connection registry instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<ConnectionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Open the database at `target`, which may be a plain path, a `file:`
    /// URI, or a `:memory:` form.
    pub fn open(self, target: impl AsRef<str>) -> Result<Database> {
        let target = target.as_ref();
        let driver = self.driver.unwrap_or_else(|| DEFAULT_DRIVER.to_string());

        let mut config = DriverConfig::new().with_functions(self.functions);
        if let Some(query) = self.startup_query {
            config = config.with_startup_query(query);
        }
        if let Some(hook) = self.hook {
            config = config.with_hook(hook);
        }
        let config = driver::initialize(&driver, config);

        let registry = self.registry.unwrap_or_else(ConnectionRegistry::global);
        let normalized = normalize_target(target);

        let mut pool_size = self.pool_size.unwrap_or(DEFAULT_POOL_SIZE).max(1);
        match &normalized.file {
            Some(file) => prepare_file(file, self.fail_if_missing)?,
            None => pool_size = 1,
        }

        let pool = ConnectionPool::new(normalized.dsn, driver, pool_size, config, registry)?;
        Ok(Database::from_pool(Arc::new(pool)))
    }
}

struct NormalizedTarget {
    /// The string handed to SQLite.
    dsn: String,
    /// The backing file for filesystem preparation; `None` for memory forms.
    file: Option<PathBuf>,
}

/// Strip URI decoration down to the backing file path.
///
/// Memory forms pass through untouched; otherwise a leading `file:` scheme, a
/// leading `//`, and any `?` query-string suffix are removed so the
/// filesystem checks and SQLite agree on the same file.
fn normalize_target(target: &str) -> NormalizedTarget {
    if target.contains(":memory:") {
        return NormalizedTarget {
            dsn: target.to_string(),
            file: None,
        };
    }

    let mut file = target.strip_prefix("file:").unwrap_or(target);
    file = file.strip_prefix("//").unwrap_or(file);
    if let Some(idx) = file.find('?') {
        file = &file[..idx];
    }

    NormalizedTarget {
        dsn: file.to_string(),
        file: Some(PathBuf::from(file)),
    }
}

/// Filesystem preconditions before SQLite sees the path: create a missing
/// parent directory (one level only), then either require or touch the file.
fn prepare_file(path: &Path, fail_if_missing: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir(parent).map_err(|source| Error::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    if fail_if_missing {
        if !path.exists() {
            return Err(Error::MissingDatabase {
                path: path.to_path_buf(),
            });
        }
    } else {
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|source| Error::CreateFile {
                path: path.to_path_buf(),
                source,
            })?;
    }

    Ok(())
}
