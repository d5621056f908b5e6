//! # Shared Observation State
//!
//! Process-wide cells shared by the three cooperative tasks: the
//! monitoring loop writes, the dashboard responder and display refresher
//! read.
//!
//! Readings are held in `tokio::sync::watch` cells and replaced as whole
//! units, so a reader sees either the previous cycle's reading or the
//! current one, never a mix of the two. There is exactly one writer per
//! cell (the acquisition loop for CO2, the fetch loop for PM2.5).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::watch;

use crate::sensor::Reading;

/// Latest externally-fetched pollutant value (PM2.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReading {
    /// Rounded concentration in µg/m³
    pub value: u16,
    /// Source-local timestamp of the measurement, as reported upstream
    pub measured_at: String,
}

/// Snapshot returned by [`SharedState::system_status`].
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub mem_free: u64,
    pub mem_used: u64,
    pub mem_total: u64,
    pub uptime: u64,
    pub requests_total: u64,
}

/// Shared observation cells, created once at process start.
///
/// Held in an `Arc` and handed to each task at construction; lives for
/// the whole process.
pub struct SharedState {
    reading_tx: watch::Sender<Option<Reading>>,
    external_tx: watch::Sender<Option<ExternalReading>>,
    requests: AtomicU64,
    started: Instant,
}

impl SharedState {
    pub fn new() -> Self {
        let (reading_tx, _) = watch::channel(None);
        let (external_tx, _) = watch::channel(None);
        Self {
            reading_tx,
            external_tx,
            requests: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Replace the current reading as a whole unit.
    ///
    /// Called by the acquisition loop once per completed cycle, between
    /// two yield points.
    pub fn publish_reading(&self, reading: Reading) {
        self.reading_tx.send_replace(Some(reading));
    }

    /// Latest reading, or `None` before the first completed cycle.
    pub fn current_reading(&self) -> Option<Reading> {
        *self.reading_tx.borrow()
    }

    /// Replace the external pollutant value as a whole unit.
    pub fn publish_external(&self, reading: ExternalReading) {
        self.external_tx.send_replace(Some(reading));
    }

    /// Latest external pollutant value, or `None` before the first
    /// successful fetch.
    pub fn external_reading(&self) -> Option<ExternalReading> {
        self.external_tx.borrow().clone()
    }

    /// Count one dashboard request and return the new total.
    pub fn count_request(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Diagnostic system counters for the `/status` endpoint.
    pub fn system_status(&self) -> SystemStatus {
        let (mem_free, mem_total) = memory_figures();
        SystemStatus {
            mem_free,
            mem_used: mem_total.saturating_sub(mem_free),
            mem_total,
            uptime: self.started.elapsed().as_secs(),
            requests_total: self.requests.load(Ordering::Relaxed),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort `(free, total)` memory figures in bytes.
///
/// Read from `/proc/meminfo` on Linux; zeros elsewhere. Diagnostic only.
fn memory_figures() -> (u64, u64) {
    let Ok(contents) = std::fs::read_to_string("/proc/meminfo") else {
        return (0, 0);
    };

    let mut total = 0u64;
    let mut available = 0u64;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = parse_kib(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available = parse_kib(rest);
        }
    }
    (available * 1024, total * 1024)
}

fn parse_kib(field: &str) -> u64 {
    field
        .trim()
        .trim_end_matches(" kB")
        .trim()
        .parse()
        .unwrap_or(0)
}
