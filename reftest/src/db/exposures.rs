//! Exposure record store
//!
//! Records are split across the core `exposures` table and their family's
//! extension table. Every write touching both tables runs in one
//! transaction. Reads join the two tables and return rows in insertion
//! (rowid) order.
//!
//! Filename uniqueness is enforced by the primary key at insert time; a
//! second insert for the same filename fails with `Error::DuplicateKey`.

use crate::db::schema::{ColumnOwner, IndexSchema, CORE_TABLE};
use crate::matching::{Condition, MatchPredicate};
use crate::models::instrument::{InstrumentFamily, INSTRUMENT_COLUMN};
use crate::models::ExposureRecord;
use reftest_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Exact-equality filter; `None` matches a null column
pub type AttributeFilter = BTreeMap<String, Option<String>>;

/// Uniqueness-enforcing store of exposure records
#[derive(Debug, Clone)]
pub struct ExposureStore {
    pool: SqlitePool,
    schema: IndexSchema,
}

impl ExposureStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            schema: IndexSchema::standard(),
        }
    }

    /// Add a record; fails with `DuplicateKey` if the filename is indexed
    pub async fn insert(&self, record: &ExposureRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.insert_rows(&mut *tx, record).await?;
        tx.commit().await?;

        debug!(file = %record.filename, family = %record.family, "Inserted exposure");
        Ok(())
    }

    /// Atomically delete `old_filename` and insert `record`
    pub async fn replace(&self, old_filename: &str, record: &ExposureRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let removed = Self::delete_rows(&mut *tx, old_filename).await?;
        if removed == 0 {
            return Err(Error::NotFound(old_filename.to_string()));
        }
        self.insert_rows(&mut *tx, record).await?;
        tx.commit().await?;

        info!(old = %old_filename, new = %record.filename, "Replaced exposure");
        Ok(())
    }

    /// Insert, overwriting any record with the same filename
    pub async fn upsert(&self, record: &ExposureRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let removed = Self::delete_rows(&mut *tx, &record.filename).await?;
        self.insert_rows(&mut *tx, record).await?;
        tx.commit().await?;

        if removed > 0 {
            info!(file = %record.filename, "Overwrote exposure");
        }
        Ok(())
    }

    /// Delete by filename; returns whether a record was removed
    pub async fn delete(&self, filename: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let removed = Self::delete_rows(&mut *tx, filename).await?;
        tx.commit().await?;
        Ok(removed > 0)
    }

    pub async fn contains_filename(&self, filename: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM exposures WHERE filename = ?)"#,
        )
        .bind(filename)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Total number of indexed exposures
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exposures")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Number of `family` records matching `filter` exactly
    pub async fn exists(&self, family: InstrumentFamily, filter: &AttributeFilter) -> Result<i64> {
        let (clause, binds) = self.filter_clause(family, filter)?;
        let sql = format!(
            "SELECT COUNT(*) FROM exposures e JOIN \"{}\" f ON f.filename = e.filename WHERE {}",
            family.table_name(),
            clause
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in &binds {
            query = query.bind(value);
        }
        Ok(query.fetch_one(&self.pool).await?)
    }

    /// `family` records matching `filter` exactly, in insertion order
    pub async fn find(&self, family: InstrumentFamily, filter: &AttributeFilter) -> Result<Vec<ExposureRecord>> {
        let (clause, binds) = self.filter_clause(family, filter)?;
        self.select(family, &clause, &binds).await
    }

    pub async fn get(&self, filename: &str) -> Result<Option<ExposureRecord>> {
        let instrument: Option<Option<String>> =
            sqlx::query_scalar(r#"SELECT "INSTRUME" FROM exposures WHERE filename = ?"#)
                .bind(filename)
                .fetch_optional(&self.pool)
                .await?;

        let instrument = match instrument {
            None => return Ok(None),
            Some(i) => i.unwrap_or_default(),
        };
        let family = InstrumentFamily::from_instrument(&instrument).ok_or_else(|| {
            Error::Internal(format!("{} indexed with unknown instrument '{}'", filename, instrument))
        })?;

        let mut records = self
            .select(family, "e.filename = ?", &[Some(filename.to_string())])
            .await?;
        Ok(records.pop())
    }

    /// Records satisfying `predicate`, restricted to its instrument
    ///
    /// Unknown columns or an empty alternative list are `Error::Query`.
    pub async fn query(&self, predicate: &MatchPredicate) -> Result<Vec<ExposureRecord>> {
        let family = predicate.family;
        let mut clauses = vec![format!("UPPER(e.\"{}\") = UPPER(?)", INSTRUMENT_COLUMN)];
        let mut binds = vec![Some(predicate.instrument.clone())];

        for condition in &predicate.conditions {
            let column = self.column_ref(family, condition.column())?;
            match condition {
                Condition::Equals { value, .. } => {
                    clauses.push(format!("{} = ?", column));
                    binds.push(Some(value.clone()));
                }
                Condition::AnyOf { column: name, values } => {
                    if values.is_empty() {
                        return Err(Error::Query(format!("no alternatives given for {}", name)));
                    }
                    let placeholders = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{} IN ({})", column, placeholders));
                    binds.extend(values.iter().cloned().map(Some));
                }
            }
        }

        self.select(family, &clauses.join(" AND "), &binds).await
    }

    async fn select(
        &self,
        family: InstrumentFamily,
        clause: &str,
        binds: &[Option<String>],
    ) -> Result<Vec<ExposureRecord>> {
        let sql = format!(
            "SELECT e.*, f.* FROM exposures e JOIN \"{}\" f ON f.filename = e.filename WHERE {} ORDER BY e.rowid",
            family.table_name(),
            clause
        );

        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(|row| Self::record_from_row(family, row)).collect()
    }

    fn record_from_row(family: InstrumentFamily, row: &SqliteRow) -> Result<ExposureRecord> {
        let mut attributes = BTreeMap::new();
        for column in ExposureRecord::columns(family) {
            let value: Option<String> = row.try_get(column)?;
            attributes.insert(column.to_string(), value);
        }

        Ok(ExposureRecord {
            filename: row.try_get("filename")?,
            path: row.try_get("path")?,
            family,
            attributes,
        })
    }

    /// `WHERE` body for an exact filter; null compares with `IS NULL`
    fn filter_clause(
        &self,
        family: InstrumentFamily,
        filter: &AttributeFilter,
    ) -> Result<(String, Vec<Option<String>>)> {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();

        for (column, value) in filter {
            let column_ref = if column == "filename" || column == "path" {
                format!("e.\"{}\"", column)
            } else {
                self.column_ref(family, column)?
            };
            match value {
                Some(v) => {
                    clauses.push(format!("{} = ?", column_ref));
                    binds.push(Some(v.clone()));
                }
                None => clauses.push(format!("{} IS NULL", column_ref)),
            }
        }

        if clauses.is_empty() {
            clauses.push("1 = 1".to_string());
        }
        Ok((clauses.join(" AND "), binds))
    }

    /// Qualified column reference for `column` of `family`
    fn column_ref(&self, family: InstrumentFamily, column: &str) -> Result<String> {
        match self.schema.column_owner(family, column) {
            Some(ColumnOwner::Core) => Ok(format!("e.\"{}\"", column)),
            Some(ColumnOwner::Family) => Ok(format!("f.\"{}\"", column)),
            None => Err(Error::Query(format!(
                "column {} does not exist for {}",
                column, family
            ))),
        }
    }

    async fn insert_rows(&self, conn: &mut SqliteConnection, record: &ExposureRecord) -> Result<()> {
        let family = record.family;
        let mut core_columns = vec!["filename".to_string(), "path".to_string()];
        let mut core_values = vec![Some(record.filename.clone()), Some(record.path.clone())];
        let mut family_columns = vec!["filename".to_string()];
        let mut family_values = vec![Some(record.filename.clone())];

        for (column, value) in &record.attributes {
            match self.schema.column_owner(family, column) {
                Some(ColumnOwner::Core) => {
                    core_columns.push(column.clone());
                    core_values.push(value.clone());
                }
                Some(ColumnOwner::Family) => {
                    family_columns.push(column.clone());
                    family_values.push(value.clone());
                }
                None => {
                    return Err(Error::InvalidInput(format!(
                        "{} has attribute {} unknown to {}",
                        record.filename, column, family
                    )))
                }
            }
        }

        insert_row(conn, CORE_TABLE, &core_columns, &core_values)
            .await
            .map_err(|e| duplicate_key(e, &record.filename))?;
        insert_row(conn, family.table_name(), &family_columns, &family_values)
            .await
            .map_err(|e| duplicate_key(e, &record.filename))?;

        Ok(())
    }

    /// Remove a filename from every table; returns core rows removed
    async fn delete_rows(conn: &mut SqliteConnection, filename: &str) -> Result<u64> {
        for family in InstrumentFamily::ALL {
            let sql = format!("DELETE FROM \"{}\" WHERE filename = ?", family.table_name());
            sqlx::query(&sql).bind(filename).execute(&mut *conn).await?;
        }
        let result = sqlx::query("DELETE FROM exposures WHERE filename = ?")
            .bind(filename)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}

async fn insert_row(
    conn: &mut SqliteConnection,
    table: &str,
    columns: &[String],
    values: &[Option<String>],
) -> std::result::Result<(), sqlx::Error> {
    let column_list = columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; values.len()].join(", ");
    let sql = format!("INSERT INTO \"{}\" ({}) VALUES ({})", table, column_list, placeholders);

    let mut query = sqlx::query(&sql);
    for value in values {
        query = query.bind(value);
    }
    query.execute(&mut *conn).await?;
    Ok(())
}

/// Map a primary-key violation to `Error::DuplicateKey`
fn duplicate_key(err: sqlx::Error, filename: &str) -> Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::DuplicateKey(filename.to_string())
        }
        _ => Error::Database(err),
    }
}
