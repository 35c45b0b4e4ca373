//! Indexed exposure record

use crate::models::instrument::{
    InstrumentFamily, CORE_FIELDS, DATE_OBS_COLUMN, TIME_OBS_COLUMN,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One exposure file as stored in the index
///
/// `attributes` holds every column of the core and family tables except
/// `filename`/`path`; a header key missing from the file is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureRecord {
    /// Basename; the unique key of the index
    pub filename: String,
    /// Directory containing the file
    pub path: String,
    pub family: InstrumentFamily,
    pub attributes: BTreeMap<String, Option<String>>,
}

impl ExposureRecord {
    /// Empty record for `file_path` with every column of `family` set to null
    pub fn new(file_path: &Path, family: InstrumentFamily) -> Self {
        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = file_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let attributes = Self::columns(family)
            .map(|column| (column.to_string(), None))
            .collect();

        Self {
            filename,
            path,
            family,
            attributes,
        }
    }

    /// Attribute columns of a family, core table first
    pub fn columns(family: InstrumentFamily) -> impl Iterator<Item = &'static str> {
        [DATE_OBS_COLUMN, TIME_OBS_COLUMN]
            .into_iter()
            .chain(CORE_FIELDS.iter().map(|f| f.column))
            .chain(family.fields().iter().map(|f| f.column))
    }

    /// Set an attribute, builder style
    pub fn with(mut self, column: &str, value: impl Into<String>) -> Self {
        self.set(column, Some(value.into()));
        self
    }

    pub fn set(&mut self, column: &str, value: Option<String>) {
        self.attributes.insert(column.to_string(), value);
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.attributes.get(column).and_then(|v| v.as_deref())
    }

    /// Directory joined with filename
    pub fn full_path(&self) -> PathBuf {
        Path::new(&self.path).join(&self.filename)
    }

    /// Configuration attributes: everything except observation date/time
    ///
    /// Two records with equal configurations are interchangeable test data.
    pub fn configuration(&self) -> BTreeMap<String, Option<String>> {
        self.attributes
            .iter()
            .filter(|(k, _)| k.as_str() != DATE_OBS_COLUMN && k.as_str() != TIME_OBS_COLUMN)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_has_all_columns_null() {
        let record = ExposureRecord::new(Path::new("/data/jw001_uncal.fits"), InstrumentFamily::Jwst);

        assert_eq!(record.filename, "jw001_uncal.fits");
        assert_eq!(record.path, "/data");
        assert!(record.attributes.contains_key("FILTER"));
        assert!(record.attributes.contains_key("DATE_OBS"));
        assert!(record.attributes.values().all(Option::is_none));
        assert_eq!(record.full_path(), PathBuf::from("/data/jw001_uncal.fits"));
    }

    #[test]
    fn test_configuration_excludes_observation_time() {
        let record = ExposureRecord::new(Path::new("/data/a.fits"), InstrumentFamily::Jwst)
            .with("DATE_OBS", "2017-01-01")
            .with("TIME_OBS", "12:00:00")
            .with("FILTER", "F070W");

        let config = record.configuration();
        assert!(!config.contains_key("DATE_OBS"));
        assert!(!config.contains_key("TIME_OBS"));
        assert_eq!(config.get("FILTER"), Some(&Some("F070W".to_string())));
    }
}
