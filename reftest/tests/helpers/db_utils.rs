//! Database Test Utilities

use anyhow::Result;
use reftest::db::{open_index, ExposureStore};
use tempfile::TempDir;

/// Exposure store over a fresh file-backed index
///
/// Returns (TempDir, ExposureStore) - TempDir must be kept alive for duration of test
pub async fn create_test_store() -> Result<(TempDir, ExposureStore)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("index.db");
    let pool = open_index(&db_path).await?;
    Ok((temp_dir, ExposureStore::new(pool)))
}
