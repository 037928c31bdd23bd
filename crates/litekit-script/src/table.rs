//! Tabular text rendering for streamed query results

use std::io::Write;

use litekit_core::rusqlite::types::Value;
use litekit_core::Database;

/// Stream `sql`'s result rows to `out` as tab-separated text, optionally
/// preceded by a header row of column names.
///
/// Output write failures surface as row-callback errors, since they stop the
/// stream the same way a caller-imposed cutoff would.
pub fn write_table(
    db: &Database,
    out: &mut dyn Write,
    sql: &str,
    headers: bool,
) -> Result<(), litekit_core::Error> {
    db.stream(
        &mut |columns, index, values| {
            if headers && index == 0 {
                writeln!(out, "{}", columns.join("\t"))?;
            }
            let rendered: Vec<String> = values.iter().map(display_value).collect();
            writeln!(out, "{}", rendered.join("\t"))?;
            Ok(())
        },
        sql,
        [],
    )
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
