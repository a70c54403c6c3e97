//! Error handling for the vitals monitor service
//!
//! Sample generation and the series store are total, so errors only come
//! from startup (configuration, logging, binding the listener), metrics
//! registration, and best-effort chart rendering.

use std::io;

use thiserror::Error;

/// The main error type for the monitor service
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Chart rendering errors
    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),

    /// Metrics related errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Background ticker errors
    #[error("Scheduling error: {0}")]
    Scheduling(String),
}

/// Configuration related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration file permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Configuration parsing error: {reason}")]
    ParseError { reason: String },
}

/// Chart rendering errors
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Image encoding failed: {0}")]
    Encoding(#[from] image::ImageError),

    #[error("Chart canvas too small: {width}x{height}")]
    CanvasTooSmall { width: u32, height: u32 },

    #[error("Chart canvas too large: {width}x{height}")]
    CanvasTooLarge { width: u32, height: u32 },

    #[error("Chart rendering task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Metrics related errors
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Metric registration failed: {name}")]
    RegistrationFailed { name: String },

    #[error("Metrics export failed: {reason}")]
    ExportFailed { reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MonitorError>;

/// A specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A specialized result type for chart rendering
pub type ChartResult<T> = std::result::Result<T, ChartError>;

/// A specialized result type for metrics operations
pub type MetricsResult<T> = std::result::Result<T, MetricsError>;

impl MonitorError {
    /// Get the error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            MonitorError::Config(_) => "config",
            MonitorError::Chart(_) => "chart",
            MonitorError::Metrics(_) => "metrics",
            MonitorError::Io(_) => "io",
            MonitorError::Scheduling(_) => "scheduling",
        }
    }
}

impl From<prometheus::Error> for MetricsError {
    fn from(err: prometheus::Error) -> Self {
        MetricsError::RegistrationFailed { name: err.to_string() }
    }
}
