//! Match predicates over the exposure index

use crate::models::InstrumentFamily;
use serde::Serialize;
use std::fmt;

/// One per-column condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Condition {
    /// Column equals the value exactly
    Equals { column: String, value: String },
    /// Column equals any one of the alternatives exactly
    AnyOf { column: String, values: Vec<String> },
}

impl Condition {
    pub fn column(&self) -> &str {
        match self {
            Condition::Equals { column, .. } | Condition::AnyOf { column, .. } => column,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Equals { column, value } => write!(f, "{} = {}", column, value),
            Condition::AnyOf { column, values } => write!(f, "{} in [{}]", column, values.join(", ")),
        }
    }
}

/// Conjunction of conditions, scoped to one instrument
///
/// An empty condition list matches every exposure of the instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchPredicate {
    pub family: InstrumentFamily,
    pub instrument: String,
    pub conditions: Vec<Condition>,
}

impl MatchPredicate {
    pub fn new(family: InstrumentFamily, instrument: impl Into<String>) -> Self {
        Self {
            family,
            instrument: instrument.into(),
            conditions: Vec::new(),
        }
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
