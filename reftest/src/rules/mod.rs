//! Reference-file applicability rules
//!
//! A [`RuleService`] answers two questions: which parameter keys must match
//! for a given (instrument, reference type), and how each key maps onto an
//! index column and the reference file's own header keywords. The
//! [`RuleResolver`] turns a reference header into a [`RuleSet`] and fails
//! fast when any part of that lookup is missing.

pub mod catalog;

pub use catalog::CatalogRuleService;

use crate::models::InstrumentFamily;
use crate::services::fits_header::Header;
use reftest_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reference header keywords that select the applicability rule
pub const IDENTITY_KEYWORDS: &[&str] = &["INSTRUME", "REFTYPE"];

/// Parameter keys that are metadata, never configuration discriminators
pub const ADMINISTRATIVE_PARKEYS: &[&str] = &["META.OBSERVATION.DATE", "META.OBSERVATION.TIME"];

/// How one parameter key maps onto the index and the reference header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordBinding {
    /// Index column compared against
    pub column: String,
    /// Reference header keyword holding the direct value
    pub keyword: String,
    /// Reference header keyword that may hold a `|`-delimited list of values
    #[serde(default)]
    pub wildcard: Option<String>,
}

impl KeywordBinding {
    pub fn new(column: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            keyword: keyword.into(),
            wildcard: None,
        }
    }

    pub fn with_wildcard(mut self, wildcard: impl Into<String>) -> Self {
        self.wildcard = Some(wildcard.into());
        self
    }
}

/// Backing rule-mapping service
pub trait RuleService: Send + Sync {
    /// Ordered required parameter keys for an (instrument, reference type)
    ///
    /// Returns `Error::Resolution` when no rule exists.
    fn required_parkeys(&self, instrument: &str, reftype: &str) -> Result<Vec<String>>;

    /// Binding for a parameter key, if known
    fn binding(&self, parkey: &str) -> Option<KeywordBinding>;
}

/// One required key together with its binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredParameter {
    pub parkey: String,
    pub binding: KeywordBinding,
}

/// Resolved applicability rule for one reference file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub instrument: String,
    pub reftype: String,
    pub family: InstrumentFamily,
    /// Required keys in rule order, administrative keys removed
    pub parameters: Vec<RequiredParameter>,
}

impl RuleSet {
    /// Reference header keywords the bindings read, wildcard fields included
    pub fn header_keywords(&self) -> Vec<&str> {
        let mut keywords: Vec<&str> = Vec::new();
        for param in &self.parameters {
            let binding = &param.binding;
            for keyword in std::iter::once(&binding.keyword).chain(&binding.wildcard) {
                if !keywords.contains(&keyword.as_str()) {
                    keywords.push(keyword);
                }
            }
        }
        keywords
    }
}

/// Resolves reference headers against a rule service
pub struct RuleResolver<S> {
    service: S,
}

impl<S: RuleService> RuleResolver<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Rule set for a reference file's primary header
    pub fn resolve(&self, reference: &Header) -> Result<RuleSet> {
        let instrument = reference
            .get_text("INSTRUME")
            .ok_or_else(|| Error::Resolution("reference file has no INSTRUME keyword".to_string()))?;
        let reftype = reference
            .get_text("REFTYPE")
            .ok_or_else(|| Error::Resolution("reference file has no REFTYPE keyword".to_string()))?;

        let family = InstrumentFamily::from_instrument(&instrument).ok_or_else(|| {
            Error::Resolution(format!("no instrument family for '{}'", instrument))
        })?;

        let parkeys = self.service.required_parkeys(&instrument, &reftype)?;

        let mut parameters = Vec::with_capacity(parkeys.len());
        for parkey in parkeys {
            if is_administrative(&parkey) {
                debug!(parkey = %parkey, "Dropping administrative parameter");
                continue;
            }
            let binding = self.service.binding(&parkey).ok_or_else(|| {
                Error::Resolution(format!(
                    "no keyword binding for {} (required by {} {})",
                    parkey, instrument, reftype
                ))
            })?;
            parameters.push(RequiredParameter { parkey, binding });
        }

        debug!(
            instrument = %instrument,
            reftype = %reftype,
            parameters = parameters.len(),
            "Resolved applicability rule"
        );

        Ok(RuleSet {
            instrument,
            reftype,
            family,
            parameters,
        })
    }
}

fn is_administrative(parkey: &str) -> bool {
    ADMINISTRATIVE_PARKEYS
        .iter()
        .any(|admin| admin.eq_ignore_ascii_case(parkey))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fits_header::HeaderValue;

    fn reference(instrument: &str, reftype: &str) -> Header {
        Header::from_cards([
            ("INSTRUME", HeaderValue::Text(instrument.into())),
            ("REFTYPE", HeaderValue::Text(reftype.into())),
        ])
    }

    fn service() -> CatalogRuleService {
        CatalogRuleService::from_toml_str(
            r#"
[[rules]]
instrument = "NIRCAM"
reftype = "DARK"
parkeys = [
    "META.INSTRUMENT.DETECTOR",
    "META.OBSERVATION.DATE",
    "META.INSTRUMENT.FILTER",
    "META.OBSERVATION.TIME",
]

[[rules]]
instrument = "MIRI"
reftype = "DARK"
parkeys = ["META.INSTRUMENT.MODULE"]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_drops_administrative_keys() {
        let resolver = RuleResolver::new(service());
        let rules = resolver.resolve(&reference("NIRCAM", "DARK")).unwrap();

        let keys: Vec<&str> = rules.parameters.iter().map(|p| p.parkey.as_str()).collect();
        assert_eq!(keys, vec!["META.INSTRUMENT.DETECTOR", "META.INSTRUMENT.FILTER"]);
        assert_eq!(rules.family, InstrumentFamily::Jwst);
    }

    #[test]
    fn test_header_keywords_include_wildcards() {
        let resolver = RuleResolver::new(service());
        let rules = resolver.resolve(&reference("NIRCAM", "DARK")).unwrap();

        assert_eq!(
            rules.header_keywords(),
            vec!["DETECTOR", "P_DETECT", "FILTER", "P_FILTER"]
        );
    }

    #[test]
    fn test_missing_reftype_is_resolution_error() {
        let resolver = RuleResolver::new(service());
        let header = Header::from_cards([("INSTRUME", HeaderValue::Text("NIRCAM".into()))]);
        assert!(matches!(resolver.resolve(&header), Err(Error::Resolution(_))));
    }

    #[test]
    fn test_unknown_rule_is_resolution_error() {
        let resolver = RuleResolver::new(service());
        assert!(matches!(
            resolver.resolve(&reference("NIRCAM", "FLAT")),
            Err(Error::Resolution(_))
        ));
    }

    #[test]
    fn test_unbound_parkey_is_resolution_error() {
        let resolver = RuleResolver::new(service());
        assert!(matches!(
            resolver.resolve(&reference("MIRI", "DARK")),
            Err(Error::Resolution(_))
        ));
    }
}
