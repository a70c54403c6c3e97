//! Layered configuration loading
//!
//! Environment variables are process-wide, so everything touching them lives
//! in a single test in this binary.

use tempfile::TempDir;

use vitals_monitor::config::MonitorConfig;
use vitals_monitor::error::ConfigError;

#[test]
fn test_file_then_env_layering() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("monitor.toml");
    std::fs::write(
        &path,
        "[server]\nport = 8080\n\n[sampling]\nmax_points = 50\n\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    // File values over defaults
    let config = MonitorConfig::load_with_fallback(Some(&path)).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.sampling.max_points, 50);
    assert_eq!(config.sampling.tick_interval_ms, 500);
    assert_eq!(config.logging.level, "debug");

    // Env values over file values
    std::env::set_var("VITALS_PORT", "9090");
    std::env::set_var("VITALS_MAX_POINTS", "20");
    std::env::set_var("VITALS_LOG_LEVEL", "warn");
    let config = MonitorConfig::load_with_fallback(Some(&path));
    std::env::remove_var("VITALS_PORT");
    std::env::remove_var("VITALS_MAX_POINTS");
    std::env::remove_var("VITALS_LOG_LEVEL");

    let config = config.unwrap();
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.sampling.max_points, 20);
    assert_eq!(config.logging.level, "warn");

    // Unparseable and invalid overrides are rejected
    std::env::set_var("VITALS_TICK_INTERVAL_MS", "fast");
    let bad_number = MonitorConfig::load_with_fallback(Some(&path));
    std::env::set_var("VITALS_TICK_INTERVAL_MS", "0");
    let zero_interval = MonitorConfig::load_with_fallback(Some(&path));
    std::env::remove_var("VITALS_TICK_INTERVAL_MS");

    assert!(matches!(
        bad_number,
        Err(ConfigError::InvalidValue { ref field, .. }) if field == "VITALS_TICK_INTERVAL_MS"
    ));
    assert!(matches!(
        zero_interval,
        Err(ConfigError::InvalidValue { ref field, .. }) if field == "sampling.tick_interval_ms"
    ));
}

#[test]
fn test_saved_config_reloads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("monitor.toml");

    let mut config = MonitorConfig::default();
    config.chart.width = 800;
    config.sampling.seed = Some(17);
    config.save_to_file(&path).unwrap();

    let reloaded = MonitorConfig::from_file(&path).unwrap();
    assert_eq!(reloaded, config);
}
