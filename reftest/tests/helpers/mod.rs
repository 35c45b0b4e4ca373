//! Test Helper Utilities
//!
//! Shared utilities for reftest integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod fits_writer;
pub mod log_capture;

pub use db_utils::create_test_store;
pub use fits_writer::{write_exposure, write_fits, write_raw_header, write_reference, Hdu};
pub use log_capture::LogCapture;
