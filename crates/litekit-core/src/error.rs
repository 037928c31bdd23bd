//! Error types for litekit operations

use std::path::PathBuf;

use thiserror::Error;

/// Result type for litekit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error type accepted from user-supplied hooks and row callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while opening or using a database handle
#[derive(Debug, Error)]
pub enum Error {
    /// The database file does not exist and the caller asked to fail in that case
    #[error("database file does not exist: {}", path.display())]
    MissingDatabase { path: PathBuf },

    /// The database's parent directory could not be created
    #[error("failed to create database directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database file could not be created or opened for writing
    #[error("failed to create database file {}: {source}", path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SQLite refused to open the database
    #[error("failed to open database {target}: {source}")]
    OpenFailed {
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    /// All pooled connections are checked out
    #[error("connection pool exhausted: {active} active connections (max: {max})")]
    PoolExhausted { active: usize, max: usize },

    /// An internal pool lock was poisoned by a panicking holder
    #[error("internal lock poisoned: {detail}")]
    LockPoisoned { detail: &'static str },

    /// A statement failed to prepare or execute
    #[error("statement failed: {sql}: {source}")]
    Statement {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A row callback asked to stop streaming
    #[error("row callback failed at row {row}: {source}")]
    RowCallback {
        row: usize,
        #[source]
        source: BoxError,
    },

    /// Establishing a new physical connection failed
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// A hot backup failed
    #[error(transparent)]
    Backup(#[from] BackupError),
}

/// Errors that abort establishment of one physical connection.
///
/// The logical driver stays registered and usable for future connection
/// attempts; only the connection being wired up is lost.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// A custom scalar function could not be registered
    #[error("failed to register function {name:?}: {source}")]
    Function {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The connection's backing file path could not be resolved
    #[error("couldn't get filename for connection on driver {driver:?}: {source}")]
    Filename {
        driver: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The configured startup query failed on the new connection
    #[error("connection query failed: {query}: {source}")]
    StartupQuery {
        query: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The user-supplied connection hook returned an error
    #[error("connection hook failed: {source}")]
    Hook {
        #[source]
        source: BoxError,
    },
}

/// Errors that are fatal to a single backup call.
///
/// A partial destination file is left on disk for inspection; no cleanup is
/// attempted on failure.
#[derive(Debug, Error)]
pub enum BackupError {
    /// A stale file at the destination path could not be removed
    #[error("failed to remove stale backup target {}: {source}", path.display())]
    RemoveTarget {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The destination database could not be opened
    #[error("failed to open backup destination {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// The source handle has no registered native connection
    #[error("source database {path:?} is not registered")]
    SourceNotRegistered { path: PathBuf },

    /// The destination handle has no registered native connection
    #[error("destination database {path:?} is not registered")]
    DestinationNotRegistered { path: PathBuf },

    /// Source and destination resolve to the same native connection
    #[error("source and destination resolve to the same connection: {}", path.display())]
    SameConnection { path: PathBuf },

    /// The incremental backup session could not be started
    #[error("failed to start backup session: {source}")]
    Session {
        #[source]
        source: rusqlite::Error,
    },

    /// A page-copy step failed mid-backup
    #[error("backup step failed: {source}")]
    Step {
        #[source]
        source: rusqlite::Error,
    },
}
