//! Pragma inspection

use std::io::Write;

use litekit_core::rusqlite::types::Value;
use litekit_core::Database;

// Single-valued, database-level pragmas worth showing. Multi-column and
// destructive ones (foreign_key_check, wal_checkpoint, ...) are left out.
const PRAGMA_LIST: &[&str] = &[
    "application_id",
    "auto_vacuum",
    "automatic_index",
    "busy_timeout",
    "cache_size",
    "cache_spill",
    "cell_size_check",
    "checkpoint_fullfsync",
    "compile_options",
    "data_version",
    "defer_foreign_keys",
    "encoding",
    "foreign_keys",
    "freelist_count",
    "fullfsync",
    "journal_mode",
    "journal_size_limit",
    "legacy_file_format",
    "locking_mode",
    "max_page_count",
    "mmap_size",
    "page_count",
    "page_size",
    "query_only",
    "read_uncommitted",
    "recursive_triggers",
    "reverse_unordered_selects",
    "schema_version",
    "secure_delete",
    "soft_heap_limit",
    "synchronous",
    "temp_store",
    "threads",
    "user_version",
    "wal_autocheckpoint",
];

/// Print `pragma NAME = VALUE` for each pragma in the fixed list.
///
/// Pragmas the linked SQLite build does not know print an empty value, the
/// way the command-line client shows them.
pub fn pragmas(db: &Database, out: &mut dyn Write) -> std::io::Result<()> {
    for pragma in PRAGMA_LIST {
        let mut value = String::new();
        let _ = db.stream(
            &mut |_, index, values| {
                if index == 0 {
                    value = match &values[0] {
                        Value::Null => String::new(),
                        Value::Integer(i) => i.to_string(),
                        Value::Real(f) => f.to_string(),
                        Value::Text(s) => s.clone(),
                        Value::Blob(b) => format!("<{} bytes>", b.len()),
                    };
                }
                Ok(())
            },
            &format!("PRAGMA {pragma}"),
            [],
        );
        writeln!(out, "pragma {pragma} = {value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use litekit_core::{ConnectionRegistry, OpenOptions};
    use std::sync::Arc;

    #[test]
    fn test_pragmas_lists_every_name() {
        let db = OpenOptions::new()
            .with_registry(Arc::new(ConnectionRegistry::new()))
            .open(":memory:")
            .unwrap();

        let mut out = Vec::new();
        pragmas(&db, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), PRAGMA_LIST.len());
        assert!(text.contains("pragma page_size = "));
        assert!(text.contains("pragma journal_mode = memory"));
    }
}
