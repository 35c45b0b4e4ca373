//! Logging setup
//!
//! The configured log level lives in the configuration file, so the file is
//! loaded under a scoped bootstrap subscriber and the global subscriber is
//! installed afterwards.

use reftest_common::config::{default_config_path, load_toml_config, LoggingConfig, TomlConfig};
use reftest_common::Result;
use std::path::Path;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` if set, else `level` for this tool's crates
pub fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("reftest={0},reftest_common={0}", level).into())
}

/// Stderr subscriber at the default level
pub fn bootstrap_subscriber() -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&LoggingConfig::default().level))
        .finish()
}

/// Load `path` (or the default location) with `subscriber` receiving its logs
pub fn load_config_logged<S>(subscriber: S, path: Option<&Path>) -> Result<TomlConfig>
where
    S: Subscriber + Send + Sync + 'static,
{
    tracing::subscriber::with_default(subscriber, || {
        match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => load_toml_config(&path),
            None => Ok(TomlConfig::default()),
        }
    })
}

/// Install the global subscriber for the configured level
pub fn init(config: &LoggingConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&config.level))
        .init();
}
