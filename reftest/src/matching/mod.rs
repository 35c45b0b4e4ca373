//! Configuration matching between reference files and indexed exposures

pub mod engine;
pub mod predicate;

pub use engine::{build_predicate, MatchEngine};
pub use predicate::{Condition, MatchPredicate};
