//! Exposure index database
//!
//! Opens the SQLite index with the standard table set and exposes the
//! record store over it.

pub mod exposures;
pub mod schema;

pub use exposures::{AttributeFilter, ExposureStore};
pub use schema::{IndexSchema, CORE_TABLE};

use reftest_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Create a new index at `db_path`; fails if the file exists
pub async fn create_index(db_path: &Path) -> Result<SqlitePool> {
    reftest_common::db::create_database(db_path, &IndexSchema::standard().tables()).await
}

/// Open the index at `db_path`, creating missing tables and columns
pub async fn open_index(db_path: &Path) -> Result<SqlitePool> {
    reftest_common::db::open_database(db_path, &IndexSchema::standard().tables()).await
}

/// Throwaway in-memory index
pub async fn open_memory_index() -> Result<SqlitePool> {
    reftest_common::db::open_memory_database(&IndexSchema::standard().tables()).await
}
