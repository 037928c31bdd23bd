use std::path::PathBuf;

use clap::Parser;
use litekit_core::{backup, ip_functions, Database, OpenOptions};
use litekit_script::{pragmas, run_file};

#[derive(Parser, Debug)]
#[command(name = "litekit", version)]
#[command(about = "Run an SQL script against an SQLite database")]
struct Cli {
    /// Database file to open (created if missing)
    database: String,

    /// SQL script to execute
    script: PathBuf,

    /// Echo statements as they execute
    #[arg(long)]
    echo: bool,

    /// Fail instead of creating a missing database file
    #[arg(long)]
    must_exist: bool,

    /// Print pragma values after the script completes
    #[arg(long)]
    pragmas: bool,

    /// Back up the database to this file after the script completes
    #[arg(long)]
    backup_to: Option<PathBuf>,
}

fn main() {
    // Initialize logging once; keep stdout clean for query output.
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "script run failed");
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db: Database = OpenOptions::new()
        .with_exists(cli.must_exist)
        .with_functions(ip_functions())
        .open(&cli.database)?;

    let mut out = std::io::stdout().lock();
    run_file(&db, &cli.script, cli.echo, &mut out)?;

    if cli.pragmas {
        pragmas(&db, &mut out)?;
    }
    if let Some(dest) = &cli.backup_to {
        backup(&db, dest)?;
    }

    db.close();
    Ok(())
}
