//! Database initialization
//!
//! Opens the SQLite index and applies the table schemas handed in by the
//! caller. The set of tables is always an explicit argument.

use crate::db::schema::{SchemaSync, TableSchema};
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Create a new index database; refuses to touch an existing file
pub async fn create_database(db_path: &Path, tables: &[TableSchema]) -> Result<SqlitePool> {
    if db_path.exists() {
        return Err(Error::InvalidInput(format!(
            "{} exists already",
            db_path.display()
        )));
    }
    open_database(db_path, tables).await
}

/// Open (creating if needed) the index database and ensure all tables exist
pub async fn open_database(db_path: &Path, tables: &[TableSchema]) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Per-connection settings: every pooled connection enforces foreign keys
    // and waits on locks; WAL allows readers alongside the single ingest writer
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000))
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    initialize_tables(&pool, tables).await?;

    Ok(pool)
}

/// In-memory database with the given tables (single connection)
pub async fn open_memory_database(tables: &[TableSchema]) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    initialize_tables(&pool, tables).await?;

    Ok(pool)
}

/// Create or synchronize every table, in order
///
/// Parent tables must precede tables that reference them.
pub async fn initialize_tables(pool: &SqlitePool, tables: &[TableSchema]) -> Result<()> {
    for table in tables {
        SchemaSync::ensure_table(pool, table).await?;
    }

    info!(
        "Database tables initialized ({})",
        tables.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
    );

    Ok(())
}
