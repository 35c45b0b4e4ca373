//! Declarative Table Schemas
//!
//! A table's shape is a plain value: a name, an ordered list of column
//! definitions and its foreign keys. The storage initializer receives these
//! values explicitly; nothing registers itself globally.
//!
//! Initialization has two phases:
//! 1. **CREATE TABLE IF NOT EXISTS** from the schema value
//! 2. **Auto-Sync** - add columns that exist in the schema but not in the database
//!
//! # Usage
//!
//! ```rust,ignore
//! let exposures = TableSchema::new("exposures")
//!     .column(ColumnDefinition::new("filename", "TEXT").primary_key())
//!     .column(ColumnDefinition::new("FILTER", "TEXT"));
//!
//! SchemaSync::ensure_table(&pool, &exposures).await?;
//! ```

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER", "REAL", "TIMESTAMP")
    pub sql_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY constraint
    pub primary_key: bool,
    /// UNIQUE constraint
    pub unique: bool,
    /// DEFAULT value
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            unique: false,
            default_value: None,
        }
    }

    /// Mark column as PRIMARY KEY
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Mark column as UNIQUE
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set DEFAULT value
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    fn render(&self) -> String {
        let mut sql = format!("\"{}\" {}", self.name, self.sql_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        sql
    }
}

/// `column REFERENCES table(target) ON DELETE CASCADE`
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub table: String,
    pub target: String,
}

/// Expected shape of one database table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    /// Table name in database
    pub name: String,
    /// Expected column definitions (order matters for new table creation)
    pub columns: Vec<ColumnDefinition>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Append a column
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Declare that `column` references `table(target)`
    pub fn references(
        mut self,
        column: impl Into<String>,
        table: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.into(),
            table: table.into(),
            target: target.into(),
        });
        self
    }

    /// Whether the table declares `name`
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this schema
    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDefinition::render).collect();
        for fk in &self.foreign_keys {
            parts.push(format!(
                "FOREIGN KEY (\"{}\") REFERENCES \"{}\"(\"{}\") ON DELETE CASCADE",
                fk.column, fk.table, fk.target
            ));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n)",
            self.name,
            parts.join(",\n    ")
        )
    }
}

/// Actual column from database introspection (PRAGMA table_info result)
#[derive(Debug, Clone)]
pub struct ActualColumn {
    /// Column ID (position in table)
    pub cid: i32,
    /// Column name
    pub name: String,
    /// SQL type from PRAGMA table_info
    pub type_name: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// DEFAULT value
    pub default_value: Option<String>,
    /// PRIMARY KEY flag
    pub pk: bool,
}

/// Schema drift detected between expected and actual schema
#[derive(Debug, Clone)]
pub enum SchemaDrift {
    /// Column missing from database
    MissingColumn {
        table: String,
        column: ColumnDefinition,
    },
    /// Column type mismatch (cannot auto-fix)
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
}

/// Schema introspection via PRAGMA table_info
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Read actual columns from database table, in cid order
    pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
        let query = format!("PRAGMA table_info(\"{}\")", table_name);
        let rows = sqlx::query(&query).fetch_all(pool).await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
                default_value: row.get("dflt_value"),
                pk: row.get::<i32, _>("pk") != 0,
            })
            .collect();

        columns.sort_by_key(|c| c.cid);

        Ok(columns)
    }

    /// Check if table exists
    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type='table' AND name = ?
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

/// Compare expected schema to actual database schema
pub struct SchemaDiff;

impl SchemaDiff {
    pub fn compare(schema: &TableSchema, actual: &[ActualColumn]) -> Vec<SchemaDrift> {
        let mut drift = Vec::new();

        for expected_col in &schema.columns {
            match actual.iter().find(|c| c.name == expected_col.name) {
                Some(actual_col) => {
                    if !Self::types_compatible(&expected_col.sql_type, &actual_col.type_name) {
                        drift.push(SchemaDrift::TypeMismatch {
                            table: schema.name.clone(),
                            column: expected_col.name.clone(),
                            expected: expected_col.sql_type.clone(),
                            actual: actual_col.type_name.clone(),
                        });
                    }
                }
                None => drift.push(SchemaDrift::MissingColumn {
                    table: schema.name.clone(),
                    column: expected_col.clone(),
                }),
            }
        }

        drift
    }

    /// Check if SQL types are compatible (SQLite type affinity rules)
    fn types_compatible(expected: &str, actual: &str) -> bool {
        let exp = expected.to_uppercase();
        let act = actual.to_uppercase();

        if exp == act {
            return true;
        }

        let text = |t: &str| t.contains("TEXT") || t.contains("CHAR") || t.contains("CLOB");
        let real = |t: &str| t.contains("REAL") || t.contains("FLOAT") || t.contains("DOUBLE");

        (exp.contains("INT") && act.contains("INT"))
            || (text(&exp) && text(&act))
            || (real(&exp) && real(&act))
    }
}

/// Apply schema values to a database
pub struct SchemaSync;

impl SchemaSync {
    /// Create the table if missing, then add any columns the database lacks
    ///
    /// Type changes are reported but never applied.
    pub async fn ensure_table(pool: &SqlitePool, schema: &TableSchema) -> Result<()> {
        sqlx::query(&schema.create_sql()).execute(pool).await?;

        let actual = SchemaIntrospector::introspect_table(pool, &schema.name).await?;
        let drift = SchemaDiff::compare(schema, &actual);

        if drift.is_empty() {
            debug!("Schema up to date for '{}'", schema.name);
            return Ok(());
        }

        for change in drift {
            match change {
                SchemaDrift::MissingColumn { table, column } => {
                    Self::add_column(pool, &table, &column).await?;
                }
                SchemaDrift::TypeMismatch { table, column, expected, actual } => {
                    warn!(
                        "Type mismatch in {}.{}: expected '{}', found '{}'. Manual migration required.",
                        table, column, expected, actual
                    );
                }
            }
        }

        Ok(())
    }

    /// Add missing column to table via ALTER TABLE ADD COLUMN
    async fn add_column(pool: &SqlitePool, table: &str, column: &ColumnDefinition) -> Result<()> {
        let mut sql = format!(
            "ALTER TABLE \"{}\" ADD COLUMN \"{}\" {}",
            table, column.name, column.sql_type
        );

        // SQLite cannot add PRIMARY KEY / UNIQUE columns, nor NOT NULL without a default
        if column.primary_key || column.unique {
            warn!(
                "Cannot add constrained column {}.{} via ALTER TABLE; constraint dropped",
                table, column.name
            );
        }

        match (&column.default_value, column.not_null) {
            (Some(default), true) => sql.push_str(&format!(" NOT NULL DEFAULT {}", default)),
            (Some(default), false) => sql.push_str(&format!(" DEFAULT {}", default)),
            (None, true) => warn!(
                "Cannot add NOT NULL column {}.{} without DEFAULT value; column will be nullable",
                table, column.name
            ),
            (None, false) => {}
        }

        info!("Adding column: {}.{} ({})", table, column.name, column.sql_type);

        match sqlx::query(&sql).execute(pool).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
                info!("Column {}.{} already added (concurrent initialization)", table, column.name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    fn sample_schema() -> TableSchema {
        TableSchema::new("sample")
            .column(ColumnDefinition::new("filename", "TEXT").primary_key())
            .column(ColumnDefinition::new("FILTER", "TEXT"))
            .column(ColumnDefinition::new("status", "TEXT").not_null().default("'NEW'"))
    }

    #[test]
    fn test_column_definition_builder() {
        let col = ColumnDefinition::new("test_col", "TEXT")
            .not_null()
            .unique()
            .default("'default_value'");

        assert_eq!(col.name, "test_col");
        assert_eq!(col.sql_type, "TEXT");
        assert!(col.not_null);
        assert!(col.unique);
        assert_eq!(col.default_value, Some("'default_value'".to_string()));
    }

    #[test]
    fn test_create_sql_includes_foreign_keys() {
        let schema = TableSchema::new("child")
            .column(ColumnDefinition::new("filename", "TEXT").primary_key())
            .references("filename", "parent", "filename");

        let sql = schema.create_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"child\""));
        assert!(sql.contains("\"filename\" TEXT PRIMARY KEY"));
        assert!(sql.contains("REFERENCES \"parent\"(\"filename\") ON DELETE CASCADE"));
    }

    #[test]
    fn test_types_compatible() {
        assert!(SchemaDiff::types_compatible("TEXT", "TEXT"));
        assert!(SchemaDiff::types_compatible("text", "VARCHAR(20)"));
        assert!(SchemaDiff::types_compatible("INTEGER", "INT"));
        assert!(SchemaDiff::types_compatible("DOUBLE", "REAL"));
        assert!(!SchemaDiff::types_compatible("TEXT", "INTEGER"));
    }

    #[tokio::test]
    async fn test_ensure_table_creates_fresh_table() {
        let pool = setup_test_db().await;
        let schema = sample_schema();

        SchemaSync::ensure_table(&pool, &schema).await.unwrap();

        assert!(SchemaIntrospector::table_exists(&pool, "sample").await.unwrap());
        let columns = SchemaIntrospector::introspect_table(&pool, "sample").await.unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["filename", "FILTER", "status"]);
        assert!(columns[0].pk);
    }

    #[tokio::test]
    async fn test_ensure_table_adds_missing_columns() {
        let pool = setup_test_db().await;

        sqlx::query("CREATE TABLE sample (filename TEXT PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();

        SchemaSync::ensure_table(&pool, &sample_schema()).await.unwrap();

        let columns = SchemaIntrospector::introspect_table(&pool, "sample").await.unwrap();
        assert!(columns.iter().any(|c| c.name == "FILTER"));
        assert!(columns.iter().any(|c| c.name == "status" && c.not_null));
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let pool = setup_test_db().await;
        let schema = sample_schema();

        SchemaSync::ensure_table(&pool, &schema).await.unwrap();
        SchemaSync::ensure_table(&pool, &schema).await.unwrap();

        let columns = SchemaIntrospector::introspect_table(&pool, "sample").await.unwrap();
        assert_eq!(columns.len(), 3);
    }
}
