//! Exposure metadata extraction
//!
//! Reads the fixed per-family keyword list out of an exposure's headers and
//! produces an [`ExposureRecord`]. The family is chosen from the primary
//! header's `INSTRUME`; each family's field table says which HDU a keyword
//! is read from.

use crate::models::instrument::{
    InstrumentFamily, CORE_FIELDS, DATE_OBS_COLUMN, TIME_OBS_COLUMN,
};
use crate::models::ExposureRecord;
use crate::services::fits_header::{FitsFile, Header};
use reftest_common::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Metadata extractor service
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor {}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self {}
    }

    /// Extract an exposure record from `file_path`
    ///
    /// Missing keywords become null attributes. An unreadable file, an
    /// unknown instrument or a missing extension is a `Parse` error. The file
    /// is closed before returning on every path.
    pub fn extract(&self, file_path: &Path) -> Result<ExposureRecord> {
        let mut fits = FitsFile::open(file_path)?;

        let instrument = fits
            .read_header(0, &["INSTRUME"])?
            .get_text("INSTRUME")
            .ok_or_else(|| Error::parse(file_path, "no INSTRUME keyword in primary header"))?;

        let family = InstrumentFamily::from_instrument(&instrument).ok_or_else(|| {
            Error::parse(file_path, format!("unsupported instrument '{}'", instrument))
        })?;

        let headers = read_family_headers(&mut fits, family)?;
        let text = |ext: usize, keyword: &str| headers.get(&ext).and_then(|h| h.get_text(keyword));

        let mut record = ExposureRecord::new(file_path, family);

        let obs = family.observation_keys();
        record.set(DATE_OBS_COLUMN, text(obs.ext, obs.date_keyword));
        record.set(TIME_OBS_COLUMN, text(obs.ext, obs.time_keyword));

        for spec in CORE_FIELDS.iter().chain(family.fields()) {
            record.set(spec.column, text(spec.ext, spec.keyword));
        }

        tracing::debug!(
            file = %file_path.display(),
            family = %family,
            instrument = %instrument,
            populated = record.attributes.values().filter(|v| v.is_some()).count(),
            "Extracted exposure metadata"
        );

        Ok(record)
    }
}

/// Every HDU header the family's keyword tables refer to, keyed by HDU
fn read_family_headers(fits: &mut FitsFile, family: InstrumentFamily) -> Result<BTreeMap<usize, Header>> {
    let obs = family.observation_keys();
    let mut wanted: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    wanted
        .entry(obs.ext)
        .or_default()
        .extend([obs.date_keyword, obs.time_keyword]);
    for spec in CORE_FIELDS.iter().chain(family.fields()) {
        wanted.entry(spec.ext).or_default().push(spec.keyword);
    }

    let mut headers = BTreeMap::new();
    for (ext, keywords) in wanted {
        headers.insert(ext, fits.read_header(ext, &keywords)?);
    }
    Ok(headers)
}
