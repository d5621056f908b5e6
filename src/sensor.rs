//! # Sensor Acquisition Module
//!
//! Polls the CO2 sensor's data-ready signal with bounded retry and emits
//! one [`Reading`] per cycle.
//!
//! The state machine is `Idle → Polling → {Ready, TimedOut} → Idle`. On
//! timeout the sensor's last register value is still read and emitted,
//! marked `valid = false`: the deployed monitors always preferred a
//! best-effort value over a gap in the log, and the flag lets consumers
//! tell the two apart.
//!
//! Hardware access goes through the [`Co2Sensor`] trait so the loop can
//! be tested without an I2C bus, and so the binary can run against the
//! [`SimulatedCo2Sensor`] on a bench.

use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::clock::CalendarTime;
use crate::error::Result;

/// One CO2 measurement.
///
/// Immutable once created; the next cycle supersedes it with a new value
/// rather than mutating this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    /// Time the acquisition cycle started
    pub timestamp: CalendarTime,
    /// CO2 concentration in parts per million
    pub co2_ppm: u16,
    /// False when the data-ready poll timed out and the value is the
    /// sensor's last register content
    pub valid: bool,
}

/// Trait for CO2 sensor I/O operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Co2Sensor: Send {
    /// Whether a fresh measurement is ready to read
    async fn data_ready(&mut self) -> Result<bool>;

    /// Read the CO2 concentration register (ppm)
    async fn read_co2(&mut self) -> Result<u16>;
}

/// Acquisition state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionPhase {
    Idle,
    Polling,
    Ready,
    TimedOut,
}

/// Bounded-retry acquisition driver.
///
/// Retry parameters come from configuration, read once at startup.
pub struct Acquisition {
    max_retries: u32,
    retry_delay: Duration,
    phase: AcquisitionPhase,
}

impl Acquisition {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            phase: AcquisitionPhase::Idle,
        }
    }

    pub fn phase(&self) -> AcquisitionPhase {
        self.phase
    }

    /// Run one acquisition: poll the data-ready signal up to
    /// `max_retries` times, sleeping `retry_delay` between polls, then
    /// read the CO2 register.
    ///
    /// Each sleep is a yield point; other tasks run while this waits.
    ///
    /// # Errors
    ///
    /// Propagates sensor I/O failures. A timeout is not an error: the
    /// reading comes back with `valid = false`.
    pub async fn acquire<S: Co2Sensor + ?Sized>(
        &mut self,
        sensor: &mut S,
        timestamp: CalendarTime,
    ) -> Result<Reading> {
        self.phase = AcquisitionPhase::Polling;

        let mut ready = false;
        for attempt in 0..self.max_retries {
            if sensor.data_ready().await? {
                ready = true;
                break;
            }
            debug!(
                "Sensor not ready (attempt {}/{})",
                attempt + 1,
                self.max_retries
            );
            sleep(self.retry_delay).await;
        }

        self.phase = if ready {
            AcquisitionPhase::Ready
        } else {
            AcquisitionPhase::TimedOut
        };

        let co2_ppm = sensor.read_co2().await?;
        let reading = Reading {
            timestamp,
            co2_ppm,
            valid: ready,
        };

        self.phase = AcquisitionPhase::Idle;
        Ok(reading)
    }
}

/// Plausible indoor range the simulated sensor wanders within.
const SIMULATED_CO2_MIN: u16 = 400;
const SIMULATED_CO2_MAX: u16 = 2000;

/// Software stand-in for the SCD4x used when no hardware is attached.
///
/// Produces a bounded random walk around typical indoor levels and is
/// always ready. Real hardware plugs in behind the same [`Co2Sensor`]
/// trait.
pub struct SimulatedCo2Sensor {
    level: u16,
    rng_state: u32,
}

impl SimulatedCo2Sensor {
    pub fn new(seed: u32) -> Self {
        Self {
            level: 600,
            rng_state: seed | 1,
        }
    }

    fn next_step(&mut self) -> i32 {
        // Numerical Recipes LCG; plenty for bench noise
        self.rng_state = self
            .rng_state
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        (self.rng_state >> 16) as i32 % 31 - 15
    }
}

#[async_trait]
impl Co2Sensor for SimulatedCo2Sensor {
    async fn data_ready(&mut self) -> Result<bool> {
        Ok(true)
    }

    async fn read_co2(&mut self) -> Result<u16> {
        let next = self.level as i32 + self.next_step();
        self.level = next.clamp(SIMULATED_CO2_MIN as i32, SIMULATED_CO2_MAX as i32) as u16;
        Ok(self.level)
    }
}
