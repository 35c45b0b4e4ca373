//! reftest library interface
//!
//! Indexes FITS exposures by instrument configuration and selects the
//! exposures a candidate calibration reference file applies to.

pub mod db;
pub mod logging;
pub mod matching;
pub mod models;
pub mod regression;
pub mod rules;
pub mod services;

pub use reftest_common::{Error, Result};
