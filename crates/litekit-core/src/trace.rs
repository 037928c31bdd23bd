//! Statement tracing hook (feature `trace`)

use std::sync::Arc;

use crate::driver::Hook;

/// A connection hook that logs every statement at debug level.
///
/// Install it with [`crate::OpenOptions::with_hook`] to see the SQL a
/// connection actually runs, expanded by the engine.
pub fn trace_hook() -> Hook {
    Arc::new(|conn| {
        conn.trace(Some(|sql: &str| {
            tracing::debug!(target: "litekit::trace", statement = sql);
        }));
        Ok(())
    })
}
