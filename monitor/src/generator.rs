//! Synthetic vital-sign generation
//!
//! Readings are bounded noise around a fixed baseline: a wide variation term
//! plus a small jitter term, clamped into the physiological display range.
//! There is no physiological model behind them.

use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// One reading of heart rate and SpO2 at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Local>,

    /// Beats per minute
    pub heart_rate: f64,

    /// Blood oxygen saturation in percent
    pub spo2: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Local>, heart_rate: f64, spo2: f64) -> Self {
        Self { timestamp, heart_rate, spo2 }
    }

    /// Wall-clock label used on the wire and on chart axes
    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// Anything that can produce the next reading for the ticker
pub trait SampleSource: Send {
    fn next_sample(&mut self) -> Sample;
}

/// Baseline and noise envelope for a single vital sign
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VitalProfile {
    pub base: f64,
    pub variation: (f64, f64),
    pub noise: (f64, f64),
    pub min: f64,
    pub max: f64,
}

impl VitalProfile {
    pub const HEART_RATE: VitalProfile = VitalProfile {
        base: 80.0,
        variation: (-10.0, 10.0),
        noise: (-2.0, 2.0),
        min: 70.0,
        max: 90.0,
    };

    pub const SPO2: VitalProfile = VitalProfile {
        base: 98.0,
        variation: (-3.0, 2.0),
        noise: (-0.5, 0.5),
        min: 95.0,
        max: 100.0,
    };

    /// Draw one value from this profile
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let variation = rng.gen_range(self.variation.0..=self.variation.1);
        let noise = rng.gen_range(self.noise.0..=self.noise.1);
        (self.base + variation + noise).clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Production sample source backed by a seedable RNG
pub struct RandomWalkGenerator {
    rng: StdRng,
    heart_rate: VitalProfile,
    spo2: VitalProfile,
}

impl RandomWalkGenerator {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Reproducible generator, used when `sampling.seed` is configured
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            heart_rate: VitalProfile::HEART_RATE,
            spo2: VitalProfile::SPO2,
        }
    }

    pub fn generate_heart_rate(&mut self) -> f64 {
        self.heart_rate.draw(&mut self.rng)
    }

    pub fn generate_spo2(&mut self) -> f64 {
        self.spo2.draw(&mut self.rng)
    }
}

impl Default for RandomWalkGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for RandomWalkGenerator {
    fn next_sample(&mut self) -> Sample {
        let heart_rate = self.generate_heart_rate();
        let spo2 = self.generate_spo2();
        Sample::new(Local::now(), heart_rate, spo2)
    }
}
