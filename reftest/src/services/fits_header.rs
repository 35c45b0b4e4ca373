//! FITS header access
//!
//! Headers are read through `fitsio`. Callers name the keywords they need
//! for an HDU and get back a [`Header`] snapshot of those cards; absent
//! keywords are simply missing from it. Every value has a canonical text
//! rendering used for storage and matching.

use fitsio::errors::Error as FitsioError;
use reftest_common::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Leading bytes of every primary header
pub const FITS_SIGNATURE: &[u8] = b"SIMPLE  =";

/// cfitsio status for a keyword that is not in the header
const KEY_NO_EXIST: i32 = 202;

/// cfitsio status for a keyword present without a value
const VALUE_UNDEFINED: i32 = 204;

/// Whether `bytes` begin like a FITS primary header
pub fn is_fits_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(FITS_SIGNATURE)
}

/// Typed value of a header card
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Text(String),
    Logical(bool),
    Integer(i64),
    Real(f64),
}

impl HeaderValue {
    /// Classify a value as cfitsio returns it (quotes already stripped)
    pub fn from_raw(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        Some(match raw {
            "T" => HeaderValue::Logical(true),
            "F" => HeaderValue::Logical(false),
            _ => {
                if let Ok(v) = raw.parse::<i64>() {
                    HeaderValue::Integer(v)
                } else if let Ok(v) = raw.replace(['D', 'd'], "E").parse::<f64>() {
                    HeaderValue::Real(v)
                } else {
                    HeaderValue::Text(raw.to_string())
                }
            }
        })
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Text(s) => write!(f, "{}", s),
            HeaderValue::Logical(true) => write!(f, "T"),
            HeaderValue::Logical(false) => write!(f, "F"),
            HeaderValue::Integer(v) => write!(f, "{}", v),
            HeaderValue::Real(v) => write!(f, "{}", v),
        }
    }
}

/// Keyword/value cards read from one header unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<(String, HeaderValue)>,
}

impl Header {
    /// Build a header from keyword/value pairs
    pub fn from_cards<K, I>(cards: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, HeaderValue)>,
    {
        let mut header = Self::default();
        for (keyword, value) in cards {
            header.insert(keyword, value);
        }
        header
    }

    /// Record `value` for `keyword`, replacing an earlier value
    fn insert(&mut self, keyword: impl Into<String>, value: HeaderValue) {
        let keyword = keyword.into().to_ascii_uppercase();
        match self.cards.iter_mut().find(|(k, _)| *k == keyword) {
            Some(card) => card.1 = value,
            None => self.cards.push((keyword, value)),
        }
    }

    /// Value recorded for `key` (keywords are case-insensitive)
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Canonical text of the value for `key`
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.get(key).map(HeaderValue::to_string)
    }
}

/// Open FITS file
///
/// The cfitsio handle is owned by this value and closed when it is dropped,
/// on every path including header read errors.
pub struct FitsFile {
    path: PathBuf,
    fits: fitsio::FitsFile,
}

impl FitsFile {
    /// Open `path` read-only; anything cfitsio rejects is a `Parse` error
    pub fn open(path: &Path) -> Result<Self> {
        let fits = fitsio::FitsFile::open(path).map_err(|e| Error::parse(path, e.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            fits,
        })
    }

    /// Read `keywords` from HDU `ext` (0 = primary)
    ///
    /// A missing or unreadable extension is a `Parse` error; a missing
    /// keyword is left out of the returned header.
    pub fn read_header(&mut self, ext: usize, keywords: &[&str]) -> Result<Header> {
        let hdu = self.fits.hdu(ext).map_err(|e| {
            Error::parse(&self.path, format!("extension {} not readable: {}", ext, e))
        })?;

        let mut cards = Vec::with_capacity(keywords.len());
        for &keyword in keywords {
            match hdu.read_key::<String>(&mut self.fits, keyword) {
                Ok(raw) => {
                    if let Some(value) = HeaderValue::from_raw(&raw) {
                        cards.push((keyword, value));
                    }
                }
                Err(FitsioError::Fits(e)) if e.status == KEY_NO_EXIST || e.status == VALUE_UNDEFINED => {}
                Err(e) => {
                    return Err(Error::parse(
                        &self.path,
                        format!("{} in extension {}: {}", keyword, ext, e),
                    ))
                }
            }
        }
        Ok(Header::from_cards(cards))
    }
}


#[cfg(test)]
mod tests {
    use super::test_files::hdu;
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_raw_value_classification() {
        assert_eq!(HeaderValue::from_raw("NIRCAM  "), Some(HeaderValue::Text("NIRCAM".to_string())));
        assert_eq!(HeaderValue::from_raw("T"), Some(HeaderValue::Logical(true)));
        assert_eq!(HeaderValue::from_raw("-32"), Some(HeaderValue::Integer(-32)));
        assert_eq!(HeaderValue::from_raw("1.5D2"), Some(HeaderValue::Real(150.0)));
        assert_eq!(HeaderValue::from_raw("   "), None);
    }

    #[test]
    fn test_display_is_canonical_text() {
        assert_eq!(HeaderValue::Text("F070W".into()).to_string(), "F070W");
        assert_eq!(HeaderValue::Integer(1024).to_string(), "1024");
        assert_eq!(HeaderValue::Logical(false).to_string(), "F");
    }

    #[test]
    fn test_later_card_replaces_earlier_case_insensitively() {
        let header = Header::from_cards([
            ("filter", HeaderValue::Text("F070W".into())),
            ("FILTER", HeaderValue::Text("F200W".into())),
        ]);
        assert_eq!(header.cards.len(), 1);
        assert_eq!(header.get_text("Filter").as_deref(), Some("F200W"));
    }

    #[test]
    fn test_primary_header_read() {
        let file = write_temp(&hdu(
            true,
            &["INSTRUME= 'NIRCAM  '", "DATE-OBS= '2017-01-01'", "NGROUPS =                   10"],
        ));

        let header = FitsFile::open(file.path())
            .unwrap()
            .read_header(0, &["INSTRUME", "DATE-OBS", "NGROUPS", "PUPIL"])
            .unwrap();
        assert_eq!(header.get_text("INSTRUME").as_deref(), Some("NIRCAM"));
        assert_eq!(header.get_text("date-obs").as_deref(), Some("2017-01-01"));
        assert_eq!(header.get("NGROUPS"), Some(&HeaderValue::Integer(10)));
        assert!(header.get("PUPIL").is_none());
    }

    #[test]
    fn test_extension_header_read() {
        let mut bytes = hdu(true, &["INSTRUME= 'COS     '"]);
        bytes.extend(hdu(false, &["DATE-OBS= '2016-05-04'"]));
        let file = write_temp(&bytes);

        let mut fits = FitsFile::open(file.path()).unwrap();
        let ext = fits.read_header(1, &["DATE-OBS"]).unwrap();
        assert_eq!(ext.get_text("DATE-OBS").as_deref(), Some("2016-05-04"));
    }

    #[test]
    fn test_missing_extension_is_parse_error() {
        let file = write_temp(&hdu(true, &[]));

        let mut fits = FitsFile::open(file.path()).unwrap();
        match fits.read_header(1, &["DATE-OBS"]) {
            Err(Error::Parse { reason, .. }) => assert!(reason.contains("extension 1")),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_not_fits_is_parse_error() {
        let file = write_temp(b"this is plainly not a FITS file at all");
        assert!(matches!(FitsFile::open(file.path()), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_nonexistent_file_is_parse_error() {
        let result = FitsFile::open(Path::new("/nonexistent/file.fits"));
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[test]
    fn test_truncated_header_is_parse_error() {
        let mut bytes = hdu(true, &["INSTRUME= 'NIRCAM  '"]);
        bytes.truncate(1000);
        let file = write_temp(&bytes);
        assert!(matches!(FitsFile::open(file.path()), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_illegal_naxis_is_parse_error() {
        let mut s = String::new();
        for c in [
            "SIMPLE  =                    T",
            "BITPIX  =                    8",
            "NAXIS   =        1000000000000",
            "END",
        ] {
            s.push_str(&format!("{:<80}", c));
        }
        while s.len() % 2880 != 0 {
            s.push(' ');
        }
        let file = write_temp(s.as_bytes());

        let result = FitsFile::open(file.path()).and_then(|mut f| f.read_header(0, &["INSTRUME"]));
        assert!(matches!(result, Err(Error::Parse { .. })));
    }
}
