//! Index table definitions
//!
//! The index is one core `exposures` table plus one extension table per
//! instrument family, joined on `filename`. Every table is built here as a
//! [`TableSchema`] value from the family field tables and handed to the
//! initializer explicitly.

use crate::models::instrument::{
    InstrumentFamily, CORE_FIELDS, DATE_OBS_COLUMN, TIME_OBS_COLUMN,
};
use reftest_common::db::{ColumnDefinition, TableSchema};

/// Name of the shared core table
pub const CORE_TABLE: &str = "exposures";

/// Table owning a column, for a given family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnOwner {
    Core,
    Family,
}

/// Complete schema of the exposure index
#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub core: TableSchema,
    pub families: Vec<(InstrumentFamily, TableSchema)>,
}

impl IndexSchema {
    /// Core table plus every known family table
    pub fn standard() -> Self {
        let core = TableSchema::new(CORE_TABLE)
            .column(ColumnDefinition::new("filename", "TEXT").primary_key())
            .column(ColumnDefinition::new("path", "TEXT").not_null())
            .column(ColumnDefinition::new(DATE_OBS_COLUMN, "TEXT"))
            .column(ColumnDefinition::new(TIME_OBS_COLUMN, "TEXT"));
        let core = CORE_FIELDS
            .iter()
            .fold(core, |table, f| table.column(ColumnDefinition::new(f.column, "TEXT")))
            .column(
                ColumnDefinition::new("created_at", "TIMESTAMP")
                    .not_null()
                    .default("CURRENT_TIMESTAMP"),
            );

        let families = InstrumentFamily::ALL
            .iter()
            .map(|&family| (family, Self::family_table(family)))
            .collect();

        Self { core, families }
    }

    fn family_table(family: InstrumentFamily) -> TableSchema {
        let table = TableSchema::new(family.table_name())
            .column(ColumnDefinition::new("filename", "TEXT").primary_key());
        family
            .fields()
            .iter()
            .fold(table, |table, f| table.column(ColumnDefinition::new(f.column, "TEXT")))
            .references("filename", CORE_TABLE, "filename")
    }

    /// All tables, parents first
    pub fn tables(&self) -> Vec<TableSchema> {
        std::iter::once(self.core.clone())
            .chain(self.families.iter().map(|(_, t)| t.clone()))
            .collect()
    }

    /// Which table of `family` holds `column`, if any
    pub fn column_owner(&self, family: InstrumentFamily, column: &str) -> Option<ColumnOwner> {
        if column == "filename" || column == "path" || column == "created_at" {
            return None;
        }
        if self.core.has_column(column) {
            return Some(ColumnOwner::Core);
        }
        self.families
            .iter()
            .find(|(f, _)| *f == family)
            .filter(|(_, table)| table.has_column(column))
            .map(|_| ColumnOwner::Family)
    }
}

impl Default for IndexSchema {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_schema_tables() {
        let schema = IndexSchema::standard();
        let names: Vec<String> = schema.tables().into_iter().map(|t| t.name).collect();

        assert_eq!(names[0], "exposures");
        assert!(names.contains(&"jwst".to_string()));
        assert!(names.contains(&"hst_wfc3".to_string()));
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn test_family_tables_reference_core() {
        let schema = IndexSchema::standard();
        for (_, table) in &schema.families {
            assert_eq!(table.foreign_keys.len(), 1);
            assert_eq!(table.foreign_keys[0].table, CORE_TABLE);
            assert!(table.has_column("filename"));
        }
    }

    #[test]
    fn test_column_owner() {
        let schema = IndexSchema::standard();
        assert_eq!(schema.column_owner(InstrumentFamily::Jwst, "INSTRUME"), Some(ColumnOwner::Core));
        assert_eq!(schema.column_owner(InstrumentFamily::Jwst, "FILTER"), Some(ColumnOwner::Family));
        assert_eq!(schema.column_owner(InstrumentFamily::Cos, "FILTER"), None);
        assert_eq!(schema.column_owner(InstrumentFamily::Jwst, "filename"), None);
        assert_eq!(schema.column_owner(InstrumentFamily::Jwst, "NOPE"), None);
    }
}
