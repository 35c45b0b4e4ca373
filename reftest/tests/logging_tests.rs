//! Configuration loading diagnostics

mod helpers;

use helpers::LogCapture;
use reftest::logging::load_config_logged;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

#[test]
fn test_missing_config_warning_reaches_bootstrap_subscriber() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("config.toml");
    let capture = LogCapture::new();

    let config = load_config_logged(tracing_subscriber::registry().with(capture.clone()), Some(&missing)).unwrap();

    assert_eq!(config.logging.level, "info");
    capture.assert_contains("Config file not found");
    assert!(capture
        .records()
        .iter()
        .any(|r| r.level == Level::WARN && r.target.starts_with("reftest_common")));
}

#[test]
fn test_config_level_is_read_before_global_init() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();
    let capture = LogCapture::new();

    let config = load_config_logged(tracing_subscriber::registry().with(capture.clone()), Some(&path)).unwrap();

    assert_eq!(config.logging.level, "debug");
    capture.assert_contains("Loaded configuration");
}
