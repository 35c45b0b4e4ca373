//! Instrument families and their header field tables
//!
//! Each family names the extension table its configuration columns live in,
//! the header keywords that populate them (with the HDU each is read from)
//! and where its observation date/time keywords are found.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One configuration column and the header card that fills it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Column name in the index
    pub column: &'static str,
    /// FITS keyword
    pub keyword: &'static str,
    /// HDU the keyword is read from
    pub ext: usize,
}

const fn field(column: &'static str, keyword: &'static str, ext: usize) -> FieldSpec {
    FieldSpec { column, keyword, ext }
}

/// Columns of the shared `exposures` table filled from the primary header
pub const CORE_FIELDS: &[FieldSpec] = &[
    field("TELESCOP", "TELESCOP", 0),
    field("INSTRUME", "INSTRUME", 0),
    field("DETECTOR", "DETECTOR", 0),
];

/// Observation date column (administrative, never a configuration discriminator)
pub const DATE_OBS_COLUMN: &str = "DATE_OBS";

/// Observation time column (administrative, never a configuration discriminator)
pub const TIME_OBS_COLUMN: &str = "TIME_OBS";

/// Column holding the instrument name
pub const INSTRUMENT_COLUMN: &str = "INSTRUME";

const JWST_FIELDS: &[FieldSpec] = &[
    field("READPATT", "READPATT", 0),
    field("EXP_TYPE", "EXP_TYPE", 0),
    field("BAND", "BAND", 0),
    field("CHANNEL", "CHANNEL", 0),
    field("FILTER", "FILTER", 0),
    field("PUPIL", "PUPIL", 0),
    field("GRATING", "GRATING", 0),
    field("SUBARRAY", "SUBARRAY", 0),
    field("SUBSTRT1", "SUBSTRT1", 0),
    field("SUBSTRT2", "SUBSTRT2", 0),
    field("SUBSIZE1", "SUBSIZE1", 0),
    field("SUBSIZE2", "SUBSIZE2", 0),
];

const COS_FIELDS: &[FieldSpec] = &[
    field("CENWAVE", "CENWAVE", 0),
    field("EXPTYPE", "EXPTYPE", 0),
    field("LIFE_ADJ", "LIFE_ADJ", 0),
    field("OBSMODE", "OBSMODE", 0),
    field("OPT_ELEM", "OPT_ELEM", 0),
];

const STIS_FIELDS: &[FieldSpec] = &[
    field("APERTURE", "APERTURE", 0),
    field("BINAXIS1", "BINAXIS1", 0),
    field("BINAXIS2", "BINAXIS2", 0),
    field("CCDAMP", "CCDAMP", 0),
    field("CCDGAIN", "CCDGAIN", 0),
    field("CCDOFFST", "CCDOFFST", 0),
    field("CENWAVE", "CENWAVE", 0),
    field("OBSTYPE", "OBSTYPE", 0),
    field("OPT_ELEM", "OPT_ELEM", 0),
];

const WFC3_FIELDS: &[FieldSpec] = &[
    field("APERTURE", "APERTURE", 0),
    field("BINAXIS1", "BINAXIS1", 1),
    field("BINAXIS2", "BINAXIS2", 1),
    field("CCDAMP", "CCDAMP", 0),
    field("CCDGAIN", "CCDGAIN", 0),
    field("CHINJECT", "CHINJECT", 0),
    field("FILTER", "FILTER", 0),
    field("FLASHCUR", "FLASHCUR", 0),
    field("SAMP_SEQ", "SAMP_SEQ", 0),
    field("SHUTRPOS", "SHUTRPOS", 0),
    field("SUBARRAY", "SUBARRAY", 0),
    field("SUBTYPE", "SUBTYPE", 0),
];

const ACS_FIELDS: &[FieldSpec] = &[
    field("APERTURE", "APERTURE", 0),
    field("CCDAMP", "CCDAMP", 0),
    field("CCDGAIN", "CCDGAIN", 0),
    field("FILTER1", "FILTER1", 0),
    field("FILTER2", "FILTER2", 0),
    field("OBSTYPE", "OBSTYPE", 0),
    field("FLASHCUR", "FLASHCUR", 0),
    field("SHUTRPOS", "SHUTRPOS", 0),
    field("FW1OFFST", "FW1OFFST", 0),
    field("FW2OFFST", "FW2OFFST", 0),
    field("FWSOFFST", "FWSOFFST", 0),
    field("LTV1", "LTV1", 1),
    field("LTV2", "LTV2", 1),
    field("NAXIS1", "NAXIS1", 1),
    field("NAXIS2", "NAXIS2", 1),
    field("XCORNER", "XCORNER", 0),
    field("YCORNER", "YCORNER", 0),
];

/// Where a family records observation date and time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationKeys {
    pub date_keyword: &'static str,
    pub time_keyword: &'static str,
    pub ext: usize,
}

/// Known instrument families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InstrumentFamily {
    /// NIRCam, NIRSpec, MIRI, NIRISS, FGS
    Jwst,
    Acs,
    Cos,
    Stis,
    Wfc3,
}

impl InstrumentFamily {
    pub const ALL: [InstrumentFamily; 5] = [
        InstrumentFamily::Jwst,
        InstrumentFamily::Acs,
        InstrumentFamily::Cos,
        InstrumentFamily::Stis,
        InstrumentFamily::Wfc3,
    ];

    /// Family for an `INSTRUME` value (case-insensitive)
    pub fn from_instrument(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "NIRCAM" | "NIRSPEC" | "MIRI" | "NIRISS" | "FGS" => Some(InstrumentFamily::Jwst),
            "ACS" => Some(InstrumentFamily::Acs),
            "COS" => Some(InstrumentFamily::Cos),
            "STIS" => Some(InstrumentFamily::Stis),
            "WFC3" => Some(InstrumentFamily::Wfc3),
            _ => None,
        }
    }

    /// Extension table holding this family's configuration columns
    pub fn table_name(self) -> &'static str {
        match self {
            InstrumentFamily::Jwst => "jwst",
            InstrumentFamily::Acs => "hst_acs",
            InstrumentFamily::Cos => "hst_cos",
            InstrumentFamily::Stis => "hst_stis",
            InstrumentFamily::Wfc3 => "hst_wfc3",
        }
    }

    /// Family-specific configuration fields
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            InstrumentFamily::Jwst => JWST_FIELDS,
            InstrumentFamily::Acs => ACS_FIELDS,
            InstrumentFamily::Cos => COS_FIELDS,
            InstrumentFamily::Stis => STIS_FIELDS,
            InstrumentFamily::Wfc3 => WFC3_FIELDS,
        }
    }

    /// Observation date/time keywords differ in name or HDU per family
    pub fn observation_keys(self) -> ObservationKeys {
        match self {
            InstrumentFamily::Stis => ObservationKeys {
                date_keyword: "TDATEOBS",
                time_keyword: "TTIMEOBS",
                ext: 0,
            },
            InstrumentFamily::Cos => ObservationKeys {
                date_keyword: "DATE-OBS",
                time_keyword: "TIME-OBS",
                ext: 1,
            },
            InstrumentFamily::Jwst | InstrumentFamily::Acs | InstrumentFamily::Wfc3 => {
                ObservationKeys {
                    date_keyword: "DATE-OBS",
                    time_keyword: "TIME-OBS",
                    ext: 0,
                }
            }
        }
    }
}

impl fmt::Display for InstrumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
