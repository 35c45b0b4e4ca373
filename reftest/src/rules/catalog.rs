//! TOML rule catalogue
//!
//! ```toml
//! [[rules]]
//! instrument = "NIRCAM"
//! reftype = "DARK"
//! parkeys = ["META.INSTRUMENT.DETECTOR", "META.SUBARRAY.NAME", "META.OBSERVATION.DATE"]
//!
//! [parameters."META.INSTRUMENT.CORONMSK"]
//! column = "CORONMSK"
//! keyword = "CORONMSK"
//! ```
//!
//! Catalogue `[parameters]` entries override the built-in JWST bindings. A
//! bare parameter key without dots (HST style, e.g. `DETECTOR`) binds to the
//! column and keyword of the same name.

use crate::rules::{KeywordBinding, RuleService};
use reftest_common::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// One `[[rules]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleEntry {
    pub instrument: String,
    pub reftype: String,
    pub parkeys: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    rules: Vec<RuleEntry>,
    #[serde(default)]
    parameters: HashMap<String, KeywordBinding>,
}

/// (parameter key, column, direct keyword, wildcard keyword)
const JWST_BINDINGS: &[(&str, &str, &str, Option<&str>)] = &[
    ("META.INSTRUMENT.NAME", "INSTRUME", "INSTRUME", None),
    ("META.EXPOSURE.READPATT", "READPATT", "READPATT", Some("P_READPA")),
    ("META.EXPOSURE.TYPE", "EXP_TYPE", "EXP_TYPE", Some("P_EXP_TY")),
    ("META.INSTRUMENT.BAND", "BAND", "BAND", Some("P_BAND")),
    ("META.INSTRUMENT.CHANNEL", "CHANNEL", "CHANNEL", Some("P_CHANNE")),
    ("META.INSTRUMENT.DETECTOR", "DETECTOR", "DETECTOR", Some("P_DETECT")),
    ("META.INSTRUMENT.FILTER", "FILTER", "FILTER", Some("P_FILTER")),
    ("META.INSTRUMENT.PUPIL", "PUPIL", "PUPIL", Some("P_PUPIL")),
    ("META.INSTRUMENT.GRATING", "GRATING", "GRATING", Some("P_GRATIN")),
    ("META.SUBARRAY.NAME", "SUBARRAY", "SUBARRAY", Some("P_SUBARR")),
];

/// Rule service backed by an in-process catalogue
#[derive(Debug, Clone, Default)]
pub struct CatalogRuleService {
    rules: Vec<RuleEntry>,
    parameters: HashMap<String, KeywordBinding>,
}

impl CatalogRuleService {
    /// No rules, built-in bindings only
    pub fn builtin() -> Self {
        let parameters = JWST_BINDINGS
            .iter()
            .map(|&(parkey, column, keyword, wildcard)| {
                let binding = KeywordBinding::new(column, keyword);
                let binding = match wildcard {
                    Some(wildcard) => binding.with_wildcard(wildcard),
                    None => binding,
                };
                (parkey.to_string(), binding)
            })
            .collect();

        Self {
            rules: Vec::new(),
            parameters,
        }
    }

    /// Parse a catalogue on top of the built-in bindings
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid rule catalogue: {}", e)))?;

        let mut service = Self::builtin();
        service.rules = file.rules;
        for (parkey, binding) in file.parameters {
            debug!(parkey = %parkey, column = %binding.column, "Catalogue binding");
            service.parameters.insert(parkey.to_ascii_uppercase(), binding);
        }
        Ok(service)
    }

    /// Load a catalogue file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read rule catalogue {}: {}", path.display(), e))
        })?;
        let service = Self::from_toml_str(&content)?;

        info!(
            "Loaded {} rules and {} bindings from {}",
            service.rules.len(),
            service.parameters.len(),
            path.display()
        );
        Ok(service)
    }
}

impl RuleService for CatalogRuleService {
    fn required_parkeys(&self, instrument: &str, reftype: &str) -> Result<Vec<String>> {
        self.rules
            .iter()
            .find(|r| {
                r.instrument.eq_ignore_ascii_case(instrument.trim())
                    && r.reftype.eq_ignore_ascii_case(reftype.trim())
            })
            .map(|r| r.parkeys.clone())
            .ok_or_else(|| {
                Error::Resolution(format!("no rule for instrument {} reftype {}", instrument, reftype))
            })
    }

    fn binding(&self, parkey: &str) -> Option<KeywordBinding> {
        let key = parkey.trim().to_ascii_uppercase();
        if let Some(binding) = self.parameters.get(&key) {
            return Some(binding.clone());
        }
        if !key.is_empty() && !key.contains('.') {
            return Some(KeywordBinding::new(key.clone(), key));
        }
        None
    }
}
