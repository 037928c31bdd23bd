//! # litekit-script
//!
//! A line-oriented SQL-script interpreter emulating the command-line client:
//! comment stripping, statement splitting, trigger-block reassembly, a few
//! dot-directives (`.echo`, `.read`, `.print`, `.tables`), and SELECT results
//! streamed as tabular text. The heavy lifting (execute a statement, stream
//! rows) is delegated to [`litekit_core::Database`].

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use litekit_core::Database;
use regex::Regex;
use thiserror::Error;

mod pragmas;
mod table;

pub use pragmas::pragmas;
pub use table::write_table;

/// Errors from interpreting an SQL script
#[derive(Debug, Error)]
pub enum ScriptError {
    /// A `.read` target or script file could not be read
    #[error("read file: {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A mutating statement failed
    #[error("exec query: {sql} file: {file}: {source}")]
    Exec {
        sql: String,
        file: String,
        #[source]
        source: litekit_core::Error,
    },

    /// A select statement failed while streaming
    #[error("select query: {sql} file: {file}: {source}")]
    Select {
        sql: String,
        file: String,
        #[source]
        source: litekit_core::Error,
    },

    /// The `.tables` listing failed
    #[error("table error: {source}")]
    Tables {
        #[source]
        source: litekit_core::Error,
    },

    /// Writing interpreter output failed
    #[error("output write failed: {source}")]
    Write {
        #[from]
        source: std::io::Error,
    },
}

const LIST_TABLES: &str = "\
SELECT name FROM sqlite_master
WHERE type='table'
ORDER BY name";

fn block_comments() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("static regex"))
}

fn line_comments() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*--.*").expect("static regex"))
}

/// Run the contents of an SQL script file, as if by `.read`.
pub fn run_file(
    db: &Database,
    path: impl AsRef<Path>,
    echo: bool,
    out: &mut dyn Write,
) -> Result<(), ScriptError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    run_commands(db, &text, echo, out)
}

/// Interpret a buffer of SQL statements and dot-directives.
///
/// Statements are split on `;` at end of line; `CREATE TRIGGER … END;` blocks
/// are reassembled into a single statement before execution. SELECTs stream
/// their results to `out`; everything else executes for effect. The first
/// failing statement aborts the run with its error.
pub fn run_commands(
    db: &Database,
    buffer: &str,
    echo: bool,
    out: &mut dyn Write,
) -> Result<(), ScriptError> {
    let clean = block_comments().replace_all(buffer, "");
    let clean = line_comments().replace_all(&clean, "");

    let mut echo = echo;
    let mut trigger: Vec<String> = Vec::new();

    for piece in clean.split(";\n") {
        // Dot-directives never carry a semicolon, so they share a piece with
        // whatever statement follows them; peel them off line by line.
        let mut rest = piece.trim();
        while rest.starts_with('.') {
            let (first, tail) = match rest.split_once('\n') {
                Some((first, tail)) => (first.trim(), tail.trim_start()),
                None => (rest, ""),
            };
            if !run_directive(db, first, &mut echo, out)? {
                break;
            }
            rest = tail;
        }

        let line = rest.trim();
        if line.is_empty() {
            continue;
        }

        if starts_with(line, "CREATE TRIGGER") {
            trigger.clear();
            trigger.push(line.to_string());
            continue;
        }
        if !trigger.is_empty() {
            trigger.push(line.to_string());
            // The END keyword closes the block; its trailing semicolon may
            // have been consumed by the statement split.
            if is_trigger_end(line) {
                let mut stmt = trigger.join(";\n");
                trigger.clear();
                if !stmt.ends_with(';') {
                    stmt.push(';');
                }
                run_statement(db, &stmt, echo, out)?;
            }
            continue;
        }

        run_statement(db, line, echo, out)?;
    }

    Ok(())
}

/// Interpret one dot-directive line. Returns false for lines that only look
/// like directives, which fall through to the statement path.
fn run_directive(
    db: &Database,
    line: &str,
    echo: &mut bool,
    out: &mut dyn Write,
) -> Result<bool, ScriptError> {
    if let Some(rest) = line.strip_prefix(".echo ") {
        if let Some(value) = parse_bool(rest.trim()) {
            *echo = value;
        }
        return Ok(true);
    }
    if let Some(rest) = line.strip_prefix(".read ") {
        run_file(db, rest.trim(), *echo, out)?;
        return Ok(true);
    }
    if let Some(rest) = line.strip_prefix(".print ") {
        let text = rest.trim().trim_matches('"').trim_matches('\'');
        writeln!(out, "{text}")?;
        return Ok(true);
    }
    if line.starts_with(".tables") {
        write_table(db, out, LIST_TABLES, true).map_err(|source| ScriptError::Tables { source })?;
        return Ok(true);
    }
    Ok(false)
}

fn is_trigger_end(line: &str) -> bool {
    let head = line.trim_start();
    head.eq_ignore_ascii_case("END") || starts_with(head, "END;")
}

fn run_statement(
    db: &Database,
    stmt: &str,
    echo: bool,
    out: &mut dyn Write,
) -> Result<(), ScriptError> {
    if echo {
        writeln!(out, "CMD>  {stmt}")?;
    }
    if starts_with(stmt, "SELECT") {
        write_table(db, out, stmt, false).map_err(|source| ScriptError::Select {
            sql: stmt.to_string(),
            file: database_file(db),
            source,
        })
    } else {
        db.execute_batch(stmt).map_err(|source| ScriptError::Exec {
            sql: stmt.to_string(),
            file: database_file(db),
            source,
        })
    }
}

fn database_file(db: &Database) -> String {
    match db.filename() {
        Ok(Some(path)) => path.display().to_string(),
        _ => ":memory:".to_string(),
    }
}

fn starts_with(data: &str, prefix: &str) -> bool {
    data.trim_start()
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_ignores_case_and_space() {
        assert!(starts_with("  select * from t", "SELECT"));
        assert!(starts_with("CREATE TRIGGER x", "CREATE TRIGGER"));
        assert!(!starts_with("selec", "SELECT"));
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("f"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn test_comment_stripping() {
        let text = "/* block\ncomment */select 1; -- trailing\n";
        let clean = block_comments().replace_all(text, "");
        let clean = line_comments().replace_all(&clean, "");
        assert_eq!(clean.trim(), "select 1;");
    }
}
