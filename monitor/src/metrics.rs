//! Prometheus metrics for the monitor service
//!
//! Counters are recorded from the ticker and the chart handler. The registry
//! is private to each collector, so tests can build as many as they like.

use std::time::Duration;

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

use crate::config::MetricsConfig;
use crate::error::{MetricsError, MetricsResult};
use crate::generator::Sample;

/// Metrics collector for the monitor service
pub struct MetricsCollector {
    config: MetricsConfig,
    registry: Registry,
    counters: MonitorCounters,
}

/// Individual metric handles
#[derive(Clone)]
pub struct MonitorCounters {
    // Ticker metrics
    pub ticks: IntCounter,
    pub samples_generated: IntCounter,
    pub ticks_skipped: IntCounter,
    pub series_length: IntGauge,
    pub last_heart_rate: Gauge,
    pub last_spo2: Gauge,

    // Chart metrics
    pub chart_renders: IntCounter,
    pub chart_failures: IntCounter,
    pub chart_render_duration: Histogram,
}

impl MonitorCounters {
    fn new(registry: &Registry) -> MetricsResult<Self> {
        let ticks = IntCounter::with_opts(Opts::new(
            "vitals_ticks_total",
            "Ticker cycles executed",
        ))?;
        let samples_generated = IntCounter::with_opts(Opts::new(
            "vitals_samples_generated_total",
            "Samples generated and appended to the series",
        ))?;
        let ticks_skipped = IntCounter::with_opts(Opts::new(
            "vitals_ticks_skipped_total",
            "Ticker cycles skipped while paused",
        ))?;
        let series_length = IntGauge::with_opts(Opts::new(
            "vitals_series_length",
            "Samples currently retained",
        ))?;
        let last_heart_rate = Gauge::with_opts(Opts::new(
            "vitals_last_heart_rate",
            "Most recent heart rate in bpm",
        ))?;
        let last_spo2 = Gauge::with_opts(Opts::new(
            "vitals_last_spo2",
            "Most recent SpO2 in percent",
        ))?;
        let chart_renders = IntCounter::with_opts(Opts::new(
            "vitals_chart_renders_total",
            "Charts rendered successfully",
        ))?;
        let chart_failures = IntCounter::with_opts(Opts::new(
            "vitals_chart_failures_total",
            "Chart renders that failed and were served as null",
        ))?;
        let chart_render_duration = Histogram::with_opts(
            HistogramOpts::new(
                "vitals_chart_render_duration_seconds",
                "Time spent rendering and encoding the chart",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;

        registry.register(Box::new(ticks.clone()))?;
        registry.register(Box::new(samples_generated.clone()))?;
        registry.register(Box::new(ticks_skipped.clone()))?;
        registry.register(Box::new(series_length.clone()))?;
        registry.register(Box::new(last_heart_rate.clone()))?;
        registry.register(Box::new(last_spo2.clone()))?;
        registry.register(Box::new(chart_renders.clone()))?;
        registry.register(Box::new(chart_failures.clone()))?;
        registry.register(Box::new(chart_render_duration.clone()))?;

        Ok(Self {
            ticks,
            samples_generated,
            ticks_skipped,
            series_length,
            last_heart_rate,
            last_spo2,
            chart_renders,
            chart_failures,
            chart_render_duration,
        })
    }
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new(config: MetricsConfig) -> MetricsResult<Self> {
        let registry = Registry::new();
        let counters = MonitorCounters::new(&registry)?;

        Ok(Self { config, registry, counters })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn counters(&self) -> &MonitorCounters {
        &self.counters
    }

    /// Record a tick that appended a sample
    pub fn record_sample(&self, sample: &Sample, series_length: usize) {
        self.counters.ticks.inc();
        self.counters.samples_generated.inc();
        self.counters.series_length.set(series_length as i64);
        self.counters.last_heart_rate.set(sample.heart_rate);
        self.counters.last_spo2.set(sample.spo2);
    }

    /// Record a tick that was skipped because the monitor is paused
    pub fn record_skipped_tick(&self) {
        self.counters.ticks.inc();
        self.counters.ticks_skipped.inc();
    }

    pub fn record_chart_render(&self, duration: Duration) {
        self.counters.chart_renders.inc();
        self.counters.chart_render_duration.observe(duration.as_secs_f64());
    }

    pub fn record_chart_failure(&self) {
        self.counters.chart_failures.inc();
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> MetricsResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::ExportFailed { reason: e.to_string() })?;

        String::from_utf8(buffer).map_err(|e| MetricsError::ExportFailed { reason: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new(MetricsConfig::default()).unwrap();
        assert!(collector.is_enabled());
        assert_eq!(collector.counters().ticks.get(), 0);
    }

    #[test]
    fn test_tick_recording() {
        let collector = MetricsCollector::new(MetricsConfig::default()).unwrap();
        let sample = Sample::new(Local::now(), 81.5, 97.25);

        collector.record_sample(&sample, 1);
        collector.record_sample(&sample, 2);
        collector.record_skipped_tick();

        let counters = collector.counters();
        assert_eq!(counters.ticks.get(), 3);
        assert_eq!(counters.samples_generated.get(), 2);
        assert_eq!(counters.ticks_skipped.get(), 1);
        assert_eq!(counters.series_length.get(), 2);
        assert_eq!(counters.last_heart_rate.get(), 81.5);
        assert_eq!(counters.last_spo2.get(), 97.25);
    }

    #[test]
    fn test_export_contains_metric_names() {
        let collector = MetricsCollector::new(MetricsConfig::default()).unwrap();
        collector.record_chart_render(Duration::from_millis(12));
        collector.record_chart_failure();

        let exported = collector.export().unwrap();
        assert!(exported.contains("vitals_ticks_total"));
        assert!(exported.contains("vitals_chart_renders_total 1"));
        assert!(exported.contains("vitals_chart_failures_total 1"));
        assert!(exported.contains("vitals_chart_render_duration_seconds_bucket"));
    }
}
