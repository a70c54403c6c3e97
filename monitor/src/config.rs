//! Configuration management for the vitals monitor service
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `VITALS_*` environment variables. Every layer is validated before the
//! service starts.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::fs;

use serde::{Deserialize, Serialize};

use crate::chart::{MAX_DIMENSION, MIN_HEIGHT, MIN_WIDTH};
use crate::error::{ConfigError, ConfigResult};

/// Main configuration structure for the monitor service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Sample generation and retention configuration
    pub sampling: SamplingConfig,

    /// Chart rendering configuration
    pub chart: ChartConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_address: String,

    /// Listener port
    pub port: u16,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Allow cross-origin requests from any origin
    pub enable_cors: bool,
}

/// Sampling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Ticker period in milliseconds
    pub tick_interval_ms: u64,

    /// Number of samples retained in the series store
    pub max_points: usize,

    /// Fixed RNG seed for reproducible series
    pub seed: Option<u64>,
}

/// Chart rendering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Spacing of x-axis time labels in seconds
    pub tick_interval_secs: u32,

    /// Fixed y-axis range for the heart rate panel
    pub heart_rate_range: (f64, f64),

    /// Fixed y-axis range for the SpO2 panel
    pub spo2_range: (f64, f64),
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,

    /// Emit JSON formatted logs
    pub json: bool,

    /// Also write logs to this file (rotated daily)
    pub file_path: Option<PathBuf>,
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Expose the Prometheus endpoint
    pub enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            sampling: SamplingConfig::default(),
            chart: ChartConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_secs: 30,
            enable_cors: true,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            max_points: 100,
            seed: None,
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            tick_interval_secs: 10,
            heart_rate_range: (65.0, 95.0),
            spo2_range: (94.0, 101.0),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_path: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ServerConfig {
    /// Socket address the HTTP listener binds to
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_address, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidValue {
            field: "server.bind_address".to_string(),
            value: self.bind_address.clone(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SamplingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.to_string_lossy().to_string() })?;

        let config: MonitorConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError { reason: e.to_string() })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `VITALS_*` environment overrides on top of this configuration
    pub fn apply_env(mut self) -> ConfigResult<Self> {
        if let Ok(bind_address) = std::env::var("VITALS_BIND_ADDRESS") {
            self.server.bind_address = bind_address;
        }

        if let Ok(port) = std::env::var("VITALS_PORT") {
            self.server.port = parse_env("VITALS_PORT", port)?;
        }

        if let Ok(interval) = std::env::var("VITALS_TICK_INTERVAL_MS") {
            self.sampling.tick_interval_ms = parse_env("VITALS_TICK_INTERVAL_MS", interval)?;
        }

        if let Ok(max_points) = std::env::var("VITALS_MAX_POINTS") {
            self.sampling.max_points = parse_env("VITALS_MAX_POINTS", max_points)?;
        }

        if let Ok(log_level) = std::env::var("VITALS_LOG_LEVEL") {
            self.logging.level = log_level;
        }

        Ok(self)
    }

    /// Load configuration with fallback order: file -> env -> defaults
    pub fn load_with_fallback<P: AsRef<Path>>(config_path: Option<P>) -> ConfigResult<Self> {
        let config = match config_path {
            Some(path) => MonitorConfig::from_file(path)?,
            None => match Self::default_config_path() {
                Ok(path) if path.exists() => MonitorConfig::from_file(path)?,
                _ => MonitorConfig::default(),
            },
        };

        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                value: "0".to_string(),
            });
        }

        self.server.socket_addr()?;

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.request_timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }

        if self.sampling.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sampling.tick_interval_ms".to_string(),
                value: "0".to_string(),
            });
        }

        if self.sampling.max_points == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sampling.max_points".to_string(),
                value: "0".to_string(),
            });
        }

        let (width, height) = (self.chart.width, self.chart.height);
        if !(MIN_WIDTH..=MAX_DIMENSION).contains(&width)
            || !(MIN_HEIGHT..=MAX_DIMENSION).contains(&height)
        {
            return Err(ConfigError::InvalidValue {
                field: "chart.width/chart.height".to_string(),
                value: format!("{}x{}", self.chart.width, self.chart.height),
            });
        }

        if self.chart.tick_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chart.tick_interval_secs".to_string(),
                value: "0".to_string(),
            });
        }

        for (field, (low, high)) in [
            ("chart.heart_rate_range", self.chart.heart_rate_range),
            ("chart.spo2_range", self.chart.spo2_range),
        ] {
            if !(low < high) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: format!("[{}, {}]", low, high),
                });
            }
        }

        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("vitals-monitor").join("monitor.toml"))
            .ok_or_else(|| ConfigError::ValidationFailed {
                reason: "Unable to determine config directory".to_string(),
            })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|_| ConfigError::ValidationFailed {
                    reason: format!("Unable to create config directory: {}", parent.display()),
                })?;
        }

        let content = self.to_toml()?;

        fs::write(path, content)
            .map_err(|_| ConfigError::PermissionDenied { path: path.to_string_lossy().to_string() })?;

        Ok(())
    }

    /// Render the effective configuration as pretty TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationFailed { reason: e.to_string() })
    }
}

fn parse_env<T: std::str::FromStr>(field: &str, value: String) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value,
    })
}
