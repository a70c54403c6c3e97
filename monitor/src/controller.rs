//! Monitor controller: lifecycle state, the background ticker, and the
//! shared series store.
//!
//! A single `RwLock` guards both the series and the lifecycle state. The
//! ticker takes the write lock once per tick, checks the state and appends;
//! HTTP handlers take read locks and copy out what they need. A pause or
//! resume therefore takes effect at the next tick boundary, and readers only
//! ever see whole appends.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SamplingConfig;
use crate::error::{MonitorError, Result};
use crate::generator::{RandomWalkGenerator, Sample, SampleSource};
use crate::metrics::MetricsCollector;
use crate::series::SeriesStore;

/// Internal lifecycle of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No ticker task is alive
    Stopped,
    /// Ticking and appending
    Running,
    /// Ticking, but appends are skipped
    Paused,
}

/// Flattened status record served on `/api/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub paused: bool,
}

/// Ticker counters since the controller was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickStats {
    pub ticks: u64,
    pub samples_appended: u64,
    pub ticks_skipped: u64,
    pub started_at: Option<DateTime<Local>>,
}

struct MonitorInner {
    series: SeriesStore,
    state: MonitorState,
    /// Pause requested before the ticker started
    start_paused: bool,
    stats: TickStats,
}

impl MonitorInner {
    fn status(&self) -> MonitorStatus {
        match self.state {
            MonitorState::Stopped => MonitorStatus { running: false, paused: self.start_paused },
            MonitorState::Running => MonitorStatus { running: true, paused: false },
            MonitorState::Paused => MonitorStatus { running: true, paused: true },
        }
    }
}

struct TickerHandle {
    token: CancellationToken,
    join: JoinHandle<Box<dyn SampleSource>>,
}

/// Owns the series store and drives sample generation
pub struct MonitorController {
    inner: Arc<RwLock<MonitorInner>>,

    /// Parked here while no ticker is running; the ticker task owns it otherwise
    source: Mutex<Option<Box<dyn SampleSource>>>,

    ticker: Mutex<Option<TickerHandle>>,

    metrics: Arc<MetricsCollector>,

    tick_interval: Duration,
}

impl MonitorController {
    /// Create a stopped controller around an arbitrary sample source
    pub fn new(
        config: &SamplingConfig,
        source: Box<dyn SampleSource>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let inner = MonitorInner {
            series: SeriesStore::new(config.max_points),
            state: MonitorState::Stopped,
            start_paused: false,
            stats: TickStats::default(),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            source: Mutex::new(Some(source)),
            ticker: Mutex::new(None),
            metrics,
            tick_interval: config.tick_interval(),
        }
    }

    /// Create a stopped controller using the random-walk generator
    pub fn from_config(config: &SamplingConfig, metrics: Arc<MetricsCollector>) -> Self {
        let generator = match config.seed {
            Some(seed) => RandomWalkGenerator::with_seed(seed),
            None => RandomWalkGenerator::new(),
        };
        Self::new(config, Box::new(generator), metrics)
    }

    /// Start the background ticker. Returns `false` if it was already running.
    pub async fn start(&self) -> bool {
        // Held until the handle is stored so `shutdown` cannot slip in between
        let mut ticker = self.ticker.lock().await;
        let Some(source) = self.source.lock().await.take() else {
            debug!("Monitor already running, start ignored");
            return false;
        };

        {
            let mut inner = self.inner.write().await;
            inner.state = if inner.start_paused {
                MonitorState::Paused
            } else {
                MonitorState::Running
            };
            inner.start_paused = false;
            inner.stats.started_at = Some(Local::now());
        }

        let token = CancellationToken::new();
        let join = tokio::spawn(run_ticker(
            self.inner.clone(),
            source,
            self.metrics.clone(),
            self.tick_interval,
            token.clone(),
        ));
        *ticker = Some(TickerHandle { token, join });

        info!("Monitor started, ticking every {:?}", self.tick_interval);
        true
    }

    /// Stop appending samples; the ticker keeps its schedule
    pub async fn pause(&self) -> MonitorStatus {
        let mut inner = self.inner.write().await;
        let state = inner.state;
        match state {
            MonitorState::Running => {
                inner.state = MonitorState::Paused;
                info!("Monitor paused");
            }
            MonitorState::Paused => {}
            MonitorState::Stopped => inner.start_paused = true,
        }
        inner.status()
    }

    /// Resume appending on the next tick; missed ticks are not replayed
    pub async fn resume(&self) -> MonitorStatus {
        let mut inner = self.inner.write().await;
        let state = inner.state;
        match state {
            MonitorState::Paused => {
                inner.state = MonitorState::Running;
                info!("Monitor resumed");
            }
            MonitorState::Running => {}
            MonitorState::Stopped => inner.start_paused = false,
        }
        inner.status()
    }

    /// Cancel the ticker and wait for it to exit. The controller can be
    /// started again afterwards.
    pub async fn shutdown(&self) -> Result<()> {
        let mut ticker = self.ticker.lock().await;
        let Some(handle) = ticker.take() else {
            return Ok(());
        };

        handle.token.cancel();
        let source = handle
            .join
            .await
            .map_err(|e| MonitorError::Scheduling(format!("Ticker task failed: {}", e)))?;
        *self.source.lock().await = Some(source);

        let mut inner = self.inner.write().await;
        inner.start_paused = inner.state == MonitorState::Paused;
        inner.state = MonitorState::Stopped;
        info!("Monitor stopped after {} ticks", inner.stats.ticks);
        Ok(())
    }

    pub async fn status(&self) -> MonitorStatus {
        self.inner.read().await.status()
    }

    pub async fn state(&self) -> MonitorState {
        self.inner.read().await.state
    }

    pub async fn stats(&self) -> TickStats {
        self.inner.read().await.stats.clone()
    }

    /// Copy of the retained series, oldest first
    pub async fn snapshot(&self) -> Vec<Sample> {
        self.inner.read().await.series.snapshot()
    }

    pub async fn latest(&self) -> Option<Sample> {
        self.inner.read().await.series.latest()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.series.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.series.is_empty()
    }

    /// Run `f` against the series under a single read lock
    pub async fn with_series<R>(&self, f: impl FnOnce(&SeriesStore) -> R) -> R {
        let inner = self.inner.read().await;
        f(&inner.series)
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.get_mut().take() {
            handle.token.cancel();
        }
    }
}

async fn run_ticker(
    inner: Arc<RwLock<MonitorInner>>,
    mut source: Box<dyn SampleSource>,
    metrics: Arc<MetricsCollector>,
    period: Duration,
    token: CancellationToken,
) -> Box<dyn SampleSource> {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => tick(&inner, source.as_mut(), &metrics).await,
        }
    }

    debug!("Ticker exiting");
    source
}

async fn tick(inner: &RwLock<MonitorInner>, source: &mut dyn SampleSource, metrics: &MetricsCollector) {
    let mut inner = inner.write().await;
    inner.stats.ticks += 1;

    let state = inner.state;
    match state {
        MonitorState::Running => {
            let sample = source.next_sample();
            inner.series.append(sample);
            inner.stats.samples_appended += 1;
            metrics.record_sample(&sample, inner.series.len());
            debug!(
                heart_rate = sample.heart_rate,
                spo2 = sample.spo2,
                retained = inner.series.len(),
                "Sample appended"
            );
        }
        MonitorState::Paused => {
            inner.stats.ticks_skipped += 1;
            metrics.record_skipped_tick();
        }
        MonitorState::Stopped => {
            warn!("Tick observed a stopped monitor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;
    use chrono::TimeZone;

    /// Deterministic source: heart rate counts up from 70, one second apart
    struct CountingSource {
        next: u32,
    }

    impl SampleSource for CountingSource {
        fn next_sample(&mut self) -> Sample {
            let base = Local.timestamp_opt(1_700_000_000, 0).unwrap();
            let sample = Sample::new(
                base + chrono::Duration::seconds(self.next as i64),
                70.0 + self.next as f64,
                98.0,
            );
            self.next += 1;
            sample
        }
    }

    fn sampling(max_points: usize) -> SamplingConfig {
        SamplingConfig {
            tick_interval_ms: 500,
            max_points,
            seed: Some(1),
        }
    }

    fn metrics() -> Arc<MetricsCollector> {
        Arc::new(MetricsCollector::new(MetricsConfig::default()).unwrap())
    }

    fn counting_controller(max_points: usize) -> MonitorController {
        MonitorController::new(&sampling(max_points), Box::new(CountingSource { next: 0 }), metrics())
    }

    const PERIOD: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn test_initial_state() {
        let controller = counting_controller(10);
        assert_eq!(controller.state().await, MonitorState::Stopped);
        assert_eq!(controller.status().await, MonitorStatus { running: false, paused: false });
        assert!(controller.is_empty().await);
        assert!(controller.latest().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let controller = counting_controller(10);
        assert!(controller.start().await);
        assert!(!controller.start().await);
        assert_eq!(controller.status().await, MonitorStatus { running: true, paused: false });

        tokio::time::sleep(PERIOD * 2 + PERIOD / 2).await;
        // A second ticker would have doubled the count
        assert_eq!(controller.len().await, 3);
        controller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_periods_produce_three_samples() {
        let controller = MonitorController::from_config(&sampling(100), metrics());
        controller.start().await;

        tokio::time::sleep(PERIOD * 3).await;
        let samples = controller.snapshot().await;
        assert!((2..=4).contains(&samples.len()), "got {}", samples.len());
        for sample in &samples {
            assert!((70.0..=90.0).contains(&sample.heart_rate));
            assert!((95.0..=100.0).contains(&sample.spo2));
        }
        controller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_growth_and_resume_continues() {
        let controller = counting_controller(100);
        controller.start().await;

        tokio::time::sleep(PERIOD * 2 + PERIOD / 2).await;
        assert_eq!(controller.len().await, 3);

        let status = controller.pause().await;
        assert_eq!(status, MonitorStatus { running: true, paused: true });
        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(controller.len().await, 3);

        let status = controller.resume().await;
        assert_eq!(status, MonitorStatus { running: true, paused: false });
        tokio::time::sleep(PERIOD).await;
        assert_eq!(controller.len().await, 4);

        let stats = controller.stats().await;
        assert_eq!(stats.ticks_skipped, 3);
        assert_eq!(stats.samples_appended, 4);
        assert_eq!(stats.ticks, 7);
        controller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_eviction_through_ticker() {
        let controller = counting_controller(5);
        controller.start().await;

        tokio::time::sleep(PERIOD * 11 + PERIOD / 2).await;
        controller.shutdown().await.unwrap();

        let snapshot = controller.snapshot().await;
        let heart_rates: Vec<f64> = snapshot.iter().map(|s| s.heart_rate).collect();
        assert_eq!(heart_rates, vec![77.0, 78.0, 79.0, 80.0, 81.0]);
        assert!(snapshot.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_ticking_and_allows_restart() {
        let controller = counting_controller(100);
        controller.start().await;
        tokio::time::sleep(PERIOD / 2).await;
        controller.shutdown().await.unwrap();
        assert_eq!(controller.state().await, MonitorState::Stopped);

        let before = controller.len().await;
        tokio::time::sleep(PERIOD * 4).await;
        assert_eq!(controller.len().await, before);

        // The source comes back from the ticker, so numbering continues
        assert!(controller.start().await);
        tokio::time::sleep(PERIOD / 2).await;
        assert_eq!(controller.latest().await.unwrap().heart_rate, 71.0);
        controller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_before_start_starts_paused() {
        let controller = counting_controller(10);
        let status = controller.pause().await;
        assert_eq!(status, MonitorStatus { running: false, paused: true });

        controller.start().await;
        assert_eq!(controller.state().await, MonitorState::Paused);
        tokio::time::sleep(PERIOD * 2).await;
        assert!(controller.is_empty().await);

        controller.resume().await;
        tokio::time::sleep(PERIOD).await;
        assert!(!controller.is_empty().await);
        controller.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_start_and_shutdown_never_leave_an_orphan_ticker() {
        for _ in 0..25 {
            let controller = Arc::new(MonitorController::new(
                &SamplingConfig { tick_interval_ms: 1, max_points: 1_000, seed: None },
                Box::new(CountingSource { next: 0 }),
                metrics(),
            ));

            let starter = tokio::spawn({
                let controller = controller.clone();
                async move { controller.start().await }
            });
            let stopper = tokio::spawn({
                let controller = controller.clone();
                async move { controller.shutdown().await }
            });
            starter.await.unwrap();
            stopper.await.unwrap().unwrap();

            // Either order is fine, but a Stopped controller must not be ticking
            if controller.state().await == MonitorState::Stopped {
                let settled = controller.len().await;
                tokio::time::sleep(Duration::from_millis(5)).await;
                assert_eq!(controller.len().await, settled);
            } else {
                controller.shutdown().await.unwrap();
                assert_eq!(controller.state().await, MonitorState::Stopped);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_without_start_is_noop() {
        let controller = counting_controller(10);
        controller.shutdown().await.unwrap();
        assert_eq!(controller.state().await, MonitorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_follow_ticks() {
        let controller = counting_controller(10);
        controller.start().await;
        tokio::time::sleep(PERIOD + PERIOD / 2).await;
        controller.pause().await;
        tokio::time::sleep(PERIOD).await;
        controller.shutdown().await.unwrap();

        let counters = controller.metrics().counters();
        assert_eq!(counters.samples_generated.get(), 2);
        assert_eq!(counters.ticks_skipped.get(), 1);
        assert_eq!(counters.series_length.get(), 2);
        assert_eq!(counters.last_heart_rate.get(), 71.0);
    }
}
