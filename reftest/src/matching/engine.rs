//! Reference-file match engine
//!
//! Builds a [`MatchPredicate`] from a resolved rule and the reference file's
//! own header, then runs it against the exposure index. Each key is handled
//! in one of four ways:
//!
//! - wildcard field present and holding `A|B|`: disjunction over `A`, `B`
//! - direct value `GENERIC`, `N/A` or `ANY`: no condition
//! - direct value absent: no condition, logged as a warning
//! - otherwise: equality with the direct value
//!
//! The predicate is rebuilt for every call.

use crate::db::ExposureStore;
use crate::matching::predicate::{Condition, MatchPredicate};
use crate::rules::{RuleResolver, RuleService, RuleSet, IDENTITY_KEYWORDS};
use crate::services::fits_header::{FitsFile, Header};
use reftest_common::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reference values meaning "applies regardless of this attribute"
pub const WILDCARD_SENTINELS: &[&str] = &["GENERIC", "N/A", "ANY"];

/// List delimiter inside wildcard fields
pub const ALTERNATIVE_DELIMITER: char = '|';

pub fn is_wildcard_sentinel(value: &str) -> bool {
    WILDCARD_SENTINELS.contains(&value.trim())
}

/// Alternatives encoded in a wildcard field value, if it is a list
///
/// The segment after the final delimiter is discarded, each alternative is
/// trimmed and empty alternatives are dropped.
pub fn parse_alternatives(raw: &str) -> Option<Vec<String>> {
    if !raw.contains(ALTERNATIVE_DELIMITER) {
        return None;
    }
    let mut parts: Vec<&str> = raw.split(ALTERNATIVE_DELIMITER).collect();
    parts.pop();
    Some(
        parts
            .into_iter()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Predicate selecting exposures affected by a reference file
pub fn build_predicate(rules: &RuleSet, reference: &Header) -> MatchPredicate {
    let mut predicate = MatchPredicate::new(rules.family, rules.instrument.clone());

    for param in &rules.parameters {
        let binding = &param.binding;

        if let Some(wildcard_key) = &binding.wildcard {
            if let Some(raw) = reference.get_text(wildcard_key) {
                match parse_alternatives(&raw) {
                    Some(values) if values.is_empty() => {
                        warn!(
                            parkey = %param.parkey,
                            keyword = %wildcard_key,
                            value = %raw,
                            "Wildcard field lists no alternatives; no condition added"
                        );
                        continue;
                    }
                    Some(values) => {
                        info!(
                            column = %binding.column,
                            value = %raw,
                            "Match on any of {}",
                            values.join(", ")
                        );
                        predicate.push(Condition::AnyOf {
                            column: binding.column.clone(),
                            values,
                        });
                        continue;
                    }
                    None => debug!(
                        keyword = %wildcard_key,
                        value = %raw,
                        "Wildcard field is not a list; using direct value"
                    ),
                }
            }
        }

        match reference.get_text(&binding.keyword) {
            None => warn!(
                parkey = %param.parkey,
                keyword = %binding.keyword,
                "Reference file has no value; no condition added"
            ),
            Some(value) if is_wildcard_sentinel(&value) => info!(
                column = %binding.column,
                value = %value,
                "Wildcard value, attribute ignored"
            ),
            Some(value) => {
                info!(column = %binding.column, value = %value, "Match on exact value");
                predicate.push(Condition::Equals {
                    column: binding.column.clone(),
                    value,
                });
            }
        }
    }

    predicate
}

/// Finds indexed exposures affected by reference files
pub struct MatchEngine<S> {
    store: ExposureStore,
    resolver: RuleResolver<S>,
}

impl<S: RuleService> MatchEngine<S> {
    pub fn new(store: ExposureStore, resolver: RuleResolver<S>) -> Self {
        Self { store, resolver }
    }

    /// Rule set and predicate for a reference file, without querying
    pub fn plan(&self, reference_path: &Path) -> Result<(RuleSet, MatchPredicate)> {
        let mut fits = FitsFile::open(reference_path)?;
        let identity = fits.read_header(0, IDENTITY_KEYWORDS)?;
        let rules = self.resolver.resolve(&identity)?;

        let header = fits.read_header(0, &rules.header_keywords())?;
        let predicate = build_predicate(&rules, &header);
        Ok((rules, predicate))
    }

    /// Full paths of matching exposures, in index order
    ///
    /// `max_matches` of `None` or `<= 0` returns every match.
    pub async fn find_matches(&self, reference_path: &Path, max_matches: Option<i64>) -> Result<Vec<PathBuf>> {
        let (rules, predicate) = self.plan(reference_path)?;

        info!(
            reference = %reference_path.display(),
            instrument = %rules.instrument,
            reftype = %rules.reftype,
            "Searching index with {} conditions",
            predicate.conditions.len()
        );
        if predicate.is_empty() {
            info!("No conditions; every {} exposure matches", rules.instrument);
        }
        for condition in &predicate.conditions {
            debug!(condition = %condition, "Predicate");
        }

        let records = self.store.query(&predicate).await?;
        let mut paths: Vec<PathBuf> = records.iter().map(|r| r.full_path()).collect();

        info!(reference = %reference_path.display(), "Found {} matching exposures", paths.len());
        for path in &paths {
            debug!(file = %path.display(), "Matched");
        }

        if let Some(max) = max_matches.filter(|m| *m > 0) {
            let max = max as usize;
            if paths.len() > max {
                info!("Using first {} matches", max);
                paths.truncate(max);
            }
        }

        Ok(paths)
    }
}
