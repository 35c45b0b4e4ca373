//! # Reftest Common Library
//!
//! Shared code for the reference-file regression tooling:
//! - Error taxonomy (parse, duplicate key, resolution, query)
//! - TOML configuration loading and database path resolution
//! - SQLite initialization and declarative table schemas

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
