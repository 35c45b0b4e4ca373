//! Tests for database creation and schema application

use reftest_common::db::{
    create_database, open_database, ColumnDefinition, SchemaIntrospector, TableSchema,
};
use reftest_common::Error;
use tempfile::TempDir;

fn tables() -> Vec<TableSchema> {
    vec![
        TableSchema::new("parent")
            .column(ColumnDefinition::new("filename", "TEXT").primary_key()),
        TableSchema::new("child")
            .column(ColumnDefinition::new("filename", "TEXT").primary_key())
            .column(ColumnDefinition::new("FILTER", "TEXT"))
            .references("filename", "parent", "filename"),
    ]
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("index.db");

    let pool = create_database(&db_path, &tables()).await.unwrap();

    assert!(db_path.exists(), "Database file was not created");
    assert!(SchemaIntrospector::table_exists(&pool, "parent").await.unwrap());
    assert!(SchemaIntrospector::table_exists(&pool, "child").await.unwrap());
}

#[tokio::test]
async fn test_create_refuses_existing_database() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("index.db");

    let pool = create_database(&db_path, &tables()).await.unwrap();
    pool.close().await;

    let result = create_database(&db_path, &tables()).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("index.db");

    let pool1 = open_database(&db_path, &tables()).await.unwrap();
    sqlx::query("INSERT INTO parent (filename) VALUES ('a.fits')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = open_database(&db_path, &tables()).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parent")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_foreign_keys_cascade() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("index.db");
    let pool = open_database(&db_path, &tables()).await.unwrap();

    sqlx::query("INSERT INTO parent (filename) VALUES ('a.fits')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO child (filename, FILTER) VALUES ('a.fits', 'F070W')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM parent WHERE filename = 'a.fits'")
        .execute(&pool)
        .await
        .unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM child")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}
