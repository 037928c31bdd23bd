//! Registry population and driver idempotence through the open path

use std::path::Path;
use std::sync::Arc;

use litekit_core::{canonical, driver, ConnectionRegistry, OpenOptions};

#[test]
fn open_registers_connection_under_canonical_path() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ConnectionRegistry::new());
    let path = dir.path().join("registered.db");

    let _db = OpenOptions::new()
        .with_registry(Arc::clone(&registry))
        .open(path.to_string_lossy())
        .unwrap();

    let conn = registry
        .lookup(&path)
        .expect("open should register the connection");

    // The registered connection's own metadata resolves to the same canonical
    // path used as the registry key.
    let resolved: String = conn
        .lock()
        .unwrap()
        .query_row("PRAGMA database_list", [], |row| row.get(2))
        .unwrap();
    assert_eq!(canonical(Path::new(&resolved)), canonical(&path));
}

#[test]
fn registry_entry_dies_with_the_handle() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ConnectionRegistry::new());
    let path = dir.path().join("shortlived.db");

    let db = OpenOptions::new()
        .with_registry(Arc::clone(&registry))
        .open(path.to_string_lossy())
        .unwrap();
    assert!(registry.lookup(&path).is_some());

    drop(db);
    assert!(registry.lookup(&path).is_none());
}

#[test]
fn reopening_same_path_overwrites_entry() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ConnectionRegistry::new());
    let path = dir.path().join("reopened.db");

    let first = OpenOptions::new()
        .with_registry(Arc::clone(&registry))
        .open(path.to_string_lossy())
        .unwrap();
    let second = OpenOptions::new()
        .with_registry(Arc::clone(&registry))
        .open(path.to_string_lossy())
        .unwrap();

    // Last writer wins: the registered connection belongs to the second open.
    let registered = registry.lookup(&path).unwrap();
    let first_conn = first.acquire().unwrap();
    let second_conn = second.acquire().unwrap();
    assert!(Arc::ptr_eq(&registered, second_conn.shared()));
    assert!(!Arc::ptr_eq(&registered, first_conn.shared()));
}

#[test]
fn second_initialization_of_driver_is_a_silent_noop() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ConnectionRegistry::new());

    let first = OpenOptions::new()
        .with_driver("test_idempotent_driver")
        .with_query("create table if not exists first_q (id integer)")
        .with_registry(Arc::clone(&registry))
        .open(dir.path().join("one.db").to_string_lossy())
        .unwrap();

    // Same driver name, different configuration: the new startup query is
    // discarded in favor of the frozen one.
    let second = OpenOptions::new()
        .with_driver("test_idempotent_driver")
        .with_query("create table if not exists second_q (id integer)")
        .with_registry(Arc::clone(&registry))
        .open(dir.path().join("two.db").to_string_lossy())
        .unwrap();

    let count = |db: &litekit_core::Database, table: &str| -> i64 {
        let mut n = -1;
        db.stream(
            &mut |_, _, values| {
                if let litekit_core::rusqlite::types::Value::Integer(i) = values[0] {
                    n = i;
                }
                Ok(())
            },
            &format!("select count(*) from sqlite_master where name = '{table}'"),
            [],
        )
        .unwrap();
        n
    };

    assert_eq!(count(&second, "first_q"), 1);
    assert_eq!(count(&second, "second_q"), 0);
    assert!(driver::is_initialized("test_idempotent_driver"));
    drop(first);
}
