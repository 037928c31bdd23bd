//! # litekit
//!
//! A convenience layer around SQLite (via `rusqlite`) for applications that
//! share one database between many threads and need live backups:
//!
//! - **[`ConnectionRegistry`]**: process-wide mapping from a database file to
//!   its live native connection, populated as a side effect of opening
//! - **Driver registration**: idempotent, named bundles of per-connection
//!   setup (custom scalar functions, a startup query, a user hook)
//! - **[`backup`]**: hot backup of an open database to another file via the
//!   engine's incremental page-copy protocol
//! - **[`Server`]**: a single-writer/multi-reader broker serializing
//!   mutating statements against one handle while reads stream concurrently
//!
//! ## Example
//!
//! ```no_run
//! use litekit_core::{backup, OpenOptions, Server};
//!
//! let db = OpenOptions::new()
//!     .with_query("PRAGMA journal_mode = WAL;")
//!     .open("state/app.db")?;
//!
//! let server = Server::new(db.clone());
//! server.exec("create table if not exists t (id integer primary key, v text)", [])?;
//! server.exec("insert into t (v) values (?1)", ["hello"])?;
//!
//! backup(&db, "state/app.backup.db")?;
//! # Ok::<(), litekit_core::Error>(())
//! ```

mod backup;
mod db;
pub mod driver;
mod error;
mod funcs;
mod open;
mod pool;
mod registry;
mod server;

#[cfg(feature = "trace")]
mod trace;

pub use backup::{backup, backup_with, Progress, DEFAULT_PAGE_STEP};
pub use db::{version, Database, RowFn};
pub use driver::{DriverConfig, Hook, ScalarFunc, DEFAULT_DRIVER};
pub use error::{BackupError, BoxError, ConnectError, Error, Result};
pub use funcs::ip_functions;
pub use open::OpenOptions;
pub use pool::{ConnectionPool, PooledConnection};
pub use registry::{canonical, ConnectionRegistry};
pub use server::Server;

#[cfg(feature = "trace")]
pub use trace::trace_hook;

// The raw engine types flow through the public API (params, values, scalar
// function contexts), so callers need the same rusqlite this crate was built
// against.
pub use rusqlite;
