//! Interpreter behavior against a live database

use std::sync::Arc;

use litekit_core::{ConnectionRegistry, OpenOptions};
use litekit_script::{run_commands, run_file, ScriptError};

fn memory_db() -> litekit_core::Database {
    OpenOptions::new()
        .with_registry(Arc::new(ConnectionRegistry::new()))
        .open(":memory:")
        .unwrap()
}

#[test]
fn trigger_block_executes_as_one_statement() {
    let db = memory_db();
    let mut out = Vec::new();

    let script = "
create table structs (id integer primary key, name text);
create table inserted (id integer, msg text);

CREATE TRIGGER structs_insert AFTER INSERT ON structs
BEGIN
    insert or replace into inserted (id) values(NEW.id);
    insert or replace into inserted (msg) values('ack!');
END;
";
    run_commands(&db, script, false, &mut out).unwrap();

    db.execute("insert into structs (name) values ('abc')", [])
        .unwrap();
    let mut rows = 0;
    db.stream(
        &mut |_, _, _| {
            rows += 1;
            Ok(())
        },
        "select * from inserted",
        [],
    )
    .unwrap();
    assert_eq!(rows, 2);
}

#[test]
fn select_statements_stream_to_output() {
    let db = memory_db();
    let mut out = Vec::new();

    let script = "
create table t (id integer primary key, v text);
insert into t (v) values ('one');
insert into t (v) values ('two');

select v from t order by id;
";
    run_commands(&db, script, false, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "one\ntwo\n");
}

#[test]
fn comments_are_stripped() {
    let db = memory_db();
    let mut out = Vec::new();

    let script = "
/* a block comment
   spanning lines */
create table t (id integer); -- trailing comment
insert into t values (1);
select id from t;
";
    run_commands(&db, script, false, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "1\n");
}

#[test]
fn print_directive_strips_quotes() {
    let db = memory_db();
    let mut out = Vec::new();

    run_commands(&db, ".print \"hello there\"\n", false, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "hello there\n");
}

#[test]
fn echo_directive_toggles_statement_echo() {
    let db = memory_db();
    let mut out = Vec::new();

    let script = "
.echo true
create table t (id integer);
";
    run_commands(&db, script, false, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("CMD>  create table t (id integer)"));
}

#[test]
fn tables_directive_lists_tables() {
    let db = memory_db();
    db.execute_batch("create table zebra (id integer); create table aardvark (id integer)")
        .unwrap();

    let mut out = Vec::new();
    run_commands(&db, ".tables\n", false, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "name");
    assert_eq!(lines[1], "aardvark");
    assert_eq!(lines[2], "zebra");
}

#[test]
fn bad_query_reports_statement() {
    let db = memory_db();
    let mut out = Vec::new();

    let err = run_commands(&db, "select asdf xyz m'kay;\n", false, &mut out).unwrap_err();
    match err {
        ScriptError::Select { sql, .. } => assert!(sql.contains("asdf")),
        other => panic!("expected select error, got: {other}"),
    }
}

#[test]
fn read_directive_missing_file_errors() {
    let db = memory_db();
    let mut out = Vec::new();

    let err = run_commands(
        &db,
        ".read /this/file/does/not/exist.sql\n",
        false,
        &mut out,
    )
    .unwrap_err();
    assert!(matches!(err, ScriptError::Read { .. }));
}

#[test]
fn run_file_executes_script_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let script_path = dir.path().join("setup.sql");
    std::fs::write(
        &script_path,
        "create table summary (country text, total int);
insert into summary values ('USA', 3);

select total from summary where country='USA';
",
    )
    .unwrap();

    let db = memory_db();
    let mut out = Vec::new();
    run_file(&db, &script_path, false, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "3\n");
}
