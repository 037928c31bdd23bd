//! Hot backup of a live database to another file
//!
//! The backup primitive needs the single physical connection behind each
//! handle, which is exactly what the connection registry records. The
//! destination is opened through the ordinary open path, so it is registered
//! as a side effect and can be looked up the same way as the source.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::backup::{Backup, StepResult};

use crate::db::Database;
use crate::error::{BackupError, Result};
use crate::open::OpenOptions;
use crate::registry::canonical;

pub use rusqlite::backup::Progress;

/// Pages copied per incremental step by [`backup`].
pub const DEFAULT_PAGE_STEP: usize = 1024;

/// Pause before retrying a step that found the source or destination busy.
const BUSY_RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Back up `db` to `dest` with the default page step, discarding progress.
pub fn backup(db: &Database, dest: impl AsRef<Path>) -> Result<()> {
    backup_with(db, dest, DEFAULT_PAGE_STEP, |_| {})
}

/// Back up `db` to the file at `dest` while the source remains open.
///
/// Any pre-existing file at `dest` is removed first: backups always start
/// from empty. On failure the partial destination file is left on disk for
/// inspection. `progress` is invoked before every copy step with the page
/// totals reported by the engine.
pub fn backup_with(
    db: &Database,
    dest: impl AsRef<Path>,
    page_step: usize,
    mut progress: impl FnMut(Progress),
) -> Result<()> {
    let dest = dest.as_ref();
    match std::fs::remove_file(dest) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(BackupError::RemoveTarget {
                path: dest.to_path_buf(),
                source,
            }
            .into())
        }
    }

    let registry = db.registry();
    let dest_db = OpenOptions::new()
        .with_registry(Arc::clone(&registry))
        .open(dest.to_string_lossy())
        .map_err(|e| BackupError::Destination {
            path: dest.to_path_buf(),
            source: Box::new(e),
        })?;

    let src_path = resolved_path(db)?;
    let dst_path = resolved_path(&dest_db)?;

    let src = registry
        .lookup(&src_path)
        .ok_or_else(|| BackupError::SourceNotRegistered {
            path: src_path.clone(),
        })?;
    let dst = registry
        .lookup(&dst_path)
        .ok_or_else(|| BackupError::DestinationNotRegistered {
            path: dst_path.clone(),
        })?;

    // The engine rejects same-connection copies; catching it here also avoids
    // taking the same slot lock twice.
    if Arc::ptr_eq(&src, &dst) {
        return Err(BackupError::SameConnection { path: src_path }.into());
    }

    let src_guard = src.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let mut dst_guard = dst.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

    let session = Backup::new(&src_guard, &mut dst_guard)
        .map_err(|source| BackupError::Session { source })?;

    // The session is finalized exactly once when it drops, on every exit
    // path; copy failures surface through the step results captured here.
    loop {
        progress(session.progress());
        match session
            .step(page_step as i32)
            .map_err(|source| BackupError::Step { source })?
        {
            StepResult::Done => break,
            StepResult::More => {}
            StepResult::Busy | StepResult::Locked => std::thread::sleep(BUSY_RETRY_PAUSE),
            // `StepResult` is `#[non_exhaustive]`; no other variants exist in
            // this rusqlite version, so retry like the other transient cases.
            _ => std::thread::sleep(BUSY_RETRY_PAUSE),
        }
    }

    drop(session);
    drop(src_guard);
    drop(dst_guard);
    dest_db.close();
    Ok(())
}

/// Canonical backing path of a handle, for registry lookup.
fn resolved_path(db: &Database) -> Result<PathBuf> {
    let path = db.filename()?.unwrap_or_default();
    if path.as_os_str().is_empty() {
        // Memory databases have no backing file and are never registered.
        return Ok(path);
    }
    Ok(canonical(&path))
}
