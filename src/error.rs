//! # Error Types
//!
//! Custom error types for the CO2 monitor using `thiserror`.
//!
//! The taxonomy mirrors how failures are handled at runtime:
//! - Startup errors (`Clock`, `Config`, `Io` during storage open) abort
//!   the process.
//! - Per-cycle errors (`Sensor`, `Io` during a log write) are logged and
//!   contained to that cycle.
//! - Per-request errors (`LogNotFound`, `NoDataLines`) are ordinary
//!   outcomes reported to the dashboard client, never process faults.

use thiserror::Error;

/// Main error type for the CO2 monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Clock hardware could not be read at startup
    #[error("clock error: {0}")]
    Clock(String),

    /// Sensor communication errors
    #[error("sensor error: {0}")]
    Sensor(String),

    /// External pollutant fetch errors
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Requested log file does not exist
    #[error("log file not found: {0}")]
    LogNotFound(String),

    /// Truncate requested on a file with only the header line
    #[error("no data lines to remove in {0}")]
    NoDataLines(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the CO2 monitor
pub type Result<T> = std::result::Result<T, MonitorError>;
