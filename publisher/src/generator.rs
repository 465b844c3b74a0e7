//! Synthetic reading generation.
//!
//! Measurements are drawn uniformly from a plausible indoor range unless the
//! caller overrides them. The timestamp always comes from the generator's
//! [`Clock`], so tests swap in a [`FixedClock`] to assert on it.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use tracing::warn;

use crate::errors::ConfigurationError;
use crate::model::{DeviceId, TelemetryReading};

pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 20.0..=27.5;
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 35.0..=55.0;

/// Source of the `recorded_at_unix` timestamp.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now_unix(&self) -> f64;
}

/// Wall clock, microsecond precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> f64 {
        Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub f64);

impl Clock for FixedClock {
    fn now_unix(&self) -> f64 {
        self.0
    }
}

/// Optional caller-supplied measurements.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Overrides {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl Overrides {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, value: f64) -> Self {
        self.temperature = Some(value);
        self
    }

    pub fn humidity(mut self, value: f64) -> Self {
        self.humidity = Some(value);
        self
    }
}

pub struct ReadingGenerator<C: Clock = SystemClock> {
    clock: C,
    rng: StdRng,
}

impl ReadingGenerator<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for ReadingGenerator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> ReadingGenerator<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic random draws, for reproducible runs.
    pub fn with_seed(clock: C, seed: u64) -> Self {
        Self {
            clock,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Build one reading for `device_id`.
    ///
    /// Present overrides are used verbatim; absent ones are drawn from
    /// [`TEMPERATURE_RANGE`] / [`HUMIDITY_RANGE`] and rounded to two decimals.
    pub fn generate(&mut self, device_id: &DeviceId, overrides: Overrides) -> TelemetryReading {
        let temperature = self.pick("temperature", overrides.temperature, TEMPERATURE_RANGE);
        let humidity = self.pick("humidity", overrides.humidity, HUMIDITY_RANGE);

        TelemetryReading::new(
            device_id.clone(),
            temperature,
            humidity,
            self.clock.now_unix(),
        )
    }

    /// `batch_size` random readings, cycling through `device_ids` in order.
    pub fn generate_batch(
        &mut self,
        device_ids: &[DeviceId],
        batch_size: usize,
    ) -> Vec<TelemetryReading> {
        device_ids
            .iter()
            .cycle()
            .take(batch_size)
            .map(|id| self.generate(id, Overrides::none()))
            .collect()
    }

    fn pick(&mut self, field: &str, value: Option<f64>, range: RangeInclusive<f64>) -> f64 {
        match value {
            Some(v) if v.is_finite() => v,
            Some(v) => {
                warn!(field, value = %v, "Ignoring non-finite override");
                round2(self.rng.gen_range(range))
            }
            None => round2(self.rng.gen_range(range)),
        }
    }
}

/// Device ids of the form `{prefix}-{index:03}` for `index` in `1..=count`.
pub fn device_ids(prefix: &str, count: usize) -> Result<Vec<DeviceId>, ConfigurationError> {
    if prefix.trim().is_empty() {
        return Err(ConfigurationError::Empty("device prefix"));
    }
    (1..=count)
        .map(|index| DeviceId::new(format!("{}-{:03}", prefix, index)))
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
