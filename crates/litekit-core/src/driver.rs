//! Idempotent logical-driver registration
//!
//! A logical driver is a named, frozen bundle of per-connection setup: custom
//! scalar functions, an optional startup query, and an optional user hook.
//! The first registration for a given name wins; later registrations with the
//! same name are silent no-ops even when their configuration differs. Callers
//! relying on cheap re-invocation depend on this, so it is part of the
//! contract, not an accident. Use [`is_initialized`] to detect the no-op case.

use std::collections::HashMap;
use std::panic::RefUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::Value;
use rusqlite::Connection;

use crate::error::{BoxError, ConnectError};
use crate::registry::ConnectionRegistry;

/// The default logical driver name.
pub const DEFAULT_DRIVER: &str = "sqlite";

static DRIVERS: OnceLock<Mutex<HashMap<String, Arc<DriverConfig>>>> = OnceLock::new();

fn drivers() -> &'static Mutex<HashMap<String, Arc<DriverConfig>>> {
    DRIVERS.get_or_init(Mutex::default)
}

/// A per-connection hook invoked after all other setup steps succeed.
pub type Hook = Arc<dyn Fn(&mut Connection) -> Result<(), BoxError> + Send + Sync>;

type ScalarFn = Arc<dyn Fn(&Context<'_>) -> rusqlite::Result<Value> + Send + Sync + RefUnwindSafe>;

/// A custom scalar function to register on every new physical connection.
#[derive(Clone)]
pub struct ScalarFunc {
    name: String,
    arity: i32,
    deterministic: bool,
    call: ScalarFn,
}

impl ScalarFunc {
    /// Describe a scalar function. `deterministic` marks the function pure so
    /// SQLite may cache its results.
    pub fn new<F>(name: impl Into<String>, arity: i32, deterministic: bool, call: F) -> Self
    where
        F: Fn(&Context<'_>) -> rusqlite::Result<Value> + Send + Sync + RefUnwindSafe + 'static,
    {
        Self {
            name: name.into(),
            arity,
            deterministic,
            call: Arc::new(call),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, conn: &Connection) -> rusqlite::Result<()> {
        let mut flags = FunctionFlags::SQLITE_UTF8;
        if self.deterministic {
            flags |= FunctionFlags::SQLITE_DETERMINISTIC;
        }
        let call = Arc::clone(&self.call);
        conn.create_scalar_function(self.name.as_str(), self.arity, flags, move |ctx| call(ctx))
    }
}

impl std::fmt::Debug for ScalarFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarFunc")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("deterministic", &self.deterministic)
            .finish()
    }
}

/// Frozen per-connection setup for one logical driver.
#[derive(Default, Clone)]
pub struct DriverConfig {
    startup_query: Option<String>,
    hook: Option<Hook>,
    functions: Vec<ScalarFunc>,
}

impl DriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// SQL to execute on every new physical connection, before the hook runs.
    pub fn with_startup_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.startup_query = (!query.is_empty()).then_some(query);
        self
    }

    /// Hook invoked on every new physical connection after all other setup.
    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Custom scalar functions registered on every new physical connection.
    pub fn with_functions(mut self, functions: Vec<ScalarFunc>) -> Self {
        self.functions = functions;
        self
    }

    /// Wire up one freshly opened physical connection.
    ///
    /// Runs, in order: scalar-function registration (failing fast on the
    /// first error), backing-path resolution and registry insertion, the
    /// startup query, and the user hook. Any failure aborts establishment of
    /// this connection only.
    pub(crate) fn establish(
        &self,
        driver: &str,
        slot: &Arc<Mutex<Connection>>,
        registry: &ConnectionRegistry,
    ) -> Result<(), ConnectError> {
        // The slot is not yet shared: it was created by the caller and has not
        // entered the pool, so this lock cannot contend.
        let mut conn = slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        for func in &self.functions {
            func.register(&conn).map_err(|source| ConnectError::Function {
                name: func.name.clone(),
                source,
            })?;
        }

        let filename = connection_filename(&conn).map_err(|source| ConnectError::Filename {
            driver: driver.to_string(),
            source,
        })?;
        if let Some(file) = filename {
            registry.register(Path::new(&file), slot);
        }

        if let Some(query) = &self.startup_query {
            conn.execute_batch(query)
                .map_err(|source| ConnectError::StartupQuery {
                    query: query.clone(),
                    source,
                })?;
        }

        if let Some(hook) = &self.hook {
            hook(&mut conn).map_err(|source| ConnectError::Hook { source })?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverConfig")
            .field("startup_query", &self.startup_query)
            .field("hook", &self.hook.as_ref().map(|_| "..."))
            .field("functions", &self.functions)
            .finish()
    }
}

/// Register `config` under `name`, or return the configuration frozen by an
/// earlier registration.
///
/// First registration wins for the lifetime of the process. A later call with
/// the same name discards its argument entirely, including a different
/// startup query, hook, or function set.
pub fn initialize(name: &str, config: DriverConfig) -> Arc<DriverConfig> {
    let mut map = drivers()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    Arc::clone(
        map.entry(name.to_string())
            .or_insert_with(|| Arc::new(config)),
    )
}

/// Whether a logical driver is already registered under `name`.
///
/// Callers that want to log rather than be surprised by the first-wins no-op
/// can check this before calling [`initialize`].
pub fn is_initialized(name: &str) -> bool {
    drivers()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .contains_key(name)
}

/// Resolve the backing file of a connection via its own metadata query.
///
/// Returns `None` for databases with no backing file (memory databases).
/// The same query resolves paths at connection time and at backup time, so
/// both sides always agree on the canonical spelling.
pub(crate) fn connection_filename(conn: &Connection) -> rusqlite::Result<Option<String>> {
    let file: Option<String> =
        conn.query_row("PRAGMA database_list", [], |row| row.get(2))?;
    Ok(file.filter(|f| !f.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_registration_wins() {
        let first = initialize(
            "test_first_wins",
            DriverConfig::new().with_startup_query("create table a (x)"),
        );
        let second = initialize(
            "test_first_wins",
            DriverConfig::new().with_startup_query("create table b (x)"),
        );

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.startup_query.as_deref(), Some("create table a (x)"));
    }

    #[test]
    fn test_is_initialized() {
        assert!(!is_initialized("test_never_registered"));
        initialize("test_registered", DriverConfig::new());
        assert!(is_initialized("test_registered"));
    }

    #[test]
    fn test_empty_startup_query_is_none() {
        let config = DriverConfig::new().with_startup_query("");
        assert!(config.startup_query.is_none());
    }

    #[test]
    fn test_connection_filename_memory() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(connection_filename(&conn).unwrap(), None);
    }

    #[test]
    fn test_establish_runs_startup_query() {
        let registry = ConnectionRegistry::new();
        let slot = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        let config = DriverConfig::new().with_startup_query("create table wired (id integer)");

        config.establish("sqlite", &slot, &registry).unwrap();

        let conn = slot.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "select count(*) from sqlite_master where name = 'wired'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_establish_bad_startup_query() {
        let registry = ConnectionRegistry::new();
        let slot = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        let config = DriverConfig::new().with_startup_query("c e n'est pas une sql query");

        let err = config.establish("sqlite", &slot, &registry).unwrap_err();
        assert!(matches!(err, ConnectError::StartupQuery { .. }));
    }

    #[test]
    fn test_establish_bad_function_fails_fast() {
        let registry = ConnectionRegistry::new();
        let slot = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        // SQLite caps scalar functions at 127 arguments; 200 cannot register.
        let bad = ScalarFunc::new("too_wide", 200, true, |_| Ok(Value::Null));
        let config = DriverConfig::new().with_functions(vec![bad]);

        let err = config.establish("sqlite", &slot, &registry).unwrap_err();
        assert!(matches!(err, ConnectError::Function { .. }));
    }

    #[test]
    fn test_establish_hook_error_propagates() {
        let registry = ConnectionRegistry::new();
        let slot = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        let hook: Hook = Arc::new(|_| Err("hook said no".into()));
        let config = DriverConfig::new().with_hook(hook);

        let err = config.establish("sqlite", &slot, &registry).unwrap_err();
        assert!(matches!(err, ConnectError::Hook { .. }));
    }
}
