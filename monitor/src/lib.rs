//! Vitals monitor service library
//!
//! This library provides the pieces of a simulated vital-sign dashboard: a
//! synthetic heart rate and SpO2 generator, a bounded series store fed by a
//! background ticker, a PNG chart renderer, and the HTTP API that serves them.

pub mod api;
pub mod chart;
pub mod config;
pub mod controller;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod series;

// Re-export commonly used types
pub use api::{create_router, ApiServer, AppState};
pub use chart::ChartRenderer;
pub use config::MonitorConfig;
pub use controller::{MonitorController, MonitorState, MonitorStatus};
pub use error::{MonitorError, Result};
pub use generator::{RandomWalkGenerator, Sample, SampleSource};
pub use metrics::MetricsCollector;
pub use series::SeriesStore;
