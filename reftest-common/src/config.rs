//! Configuration loading and database path resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the index database
pub const DATABASE_ENV_VAR: &str = "REFTEST_DB";

/// File suffixes picked up by directory crawls when none are configured
pub const DEFAULT_SUFFIXES: &[&str] = &[
    "uncal.fits",
    "rate.fits",
    "rateints.fits",
    "trapsfilled.fits",
    "dark.fits",
    "raw.fits",
    "flt.fits",
];

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Index database location
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Rule catalogue location
    #[serde(default)]
    pub rules: Option<PathBuf>,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub runner: Option<RunnerConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[ingest]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Worker threads used for header extraction (0 = one per core)
    #[serde(default)]
    pub workers: usize,

    /// In `force` mode, overwrite a record with the same filename instead of failing
    #[serde(default)]
    pub force_overwrite: bool,

    /// Filename suffixes accepted during directory crawls
    #[serde(default = "default_suffixes")]
    pub suffixes: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            force_overwrite: false,
            suffixes: default_suffixes(),
        }
    }
}

fn default_suffixes() -> Vec<String> {
    DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect()
}

/// `[runner]` section: external calibration command
///
/// `{reference}` and `{data}` in `args` are substituted per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Default configuration file path (`<config_dir>/reftest/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("reftest").join("config.toml"))
}

/// Load TOML configuration
///
/// A missing file yields defaults with a warning; a malformed file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve the index database path
///
/// Priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
///
/// There is no compiled default: an unresolved path is a configuration error.
pub fn resolve_database_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    if let Some(path) = &config.database {
        return Ok(path.clone());
    }

    Err(Error::Config(format!(
        "No index database configured. Supply one of:\n\
         1. Command line: --db <path>\n\
         2. Environment: {}=<path>\n\
         3. TOML config: database = \"<path>\"",
        env_var_name
    )))
}
