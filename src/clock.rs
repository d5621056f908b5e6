//! # Clock Source Module
//!
//! Wraps the battery-backed real-time clock behind a small trait so the
//! monitoring loop and the log router can be tested against fixed times.
//!
//! The clock is read once per acquisition cycle. It is monotonic within a
//! session but may jump when the time is set externally; nothing in the
//! core depends on monotonicity. An unreadable clock is a startup failure,
//! not a per-cycle one: the process cannot meaningfully run without
//! timestamps, so `SystemClock::new` probes the clock and aborts startup
//! if the probe fails.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{MonitorError, Result};

/// Timestamp wire format used in log files and on the dashboard.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Calendar timestamp with second resolution.
///
/// Produced by a [`ClockSource`] once per cycle and carried through the
/// reading, the log router, and the dashboard unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl CalendarTime {
    pub fn new(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Parse a timestamp in the `YYYY-MM-DD HH:MM:SS` wire format.
    ///
    /// Returns `None` for anything malformed, including calendar-invalid
    /// dates. Callers that keep timestamps as strings (the rotation state
    /// does) use this to re-validate them.
    pub fn parse(s: &str) -> Option<Self> {
        let dt = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
        })
    }

    /// 1-based day of the year, or `None` if the date is not a valid
    /// calendar date.
    pub fn ordinal_day(&self) -> Option<u32> {
        Some(self.date()?.ordinal())
    }

    /// ISO weekday (Monday = 1 .. Sunday = 7), or `None` if the date is
    /// not a valid calendar date.
    pub fn iso_weekday(&self) -> Option<u32> {
        Some(self.date()?.weekday().number_from_monday())
    }

    fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

impl std::fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Trait for reading the current calendar time
///
/// The monitoring loop takes a `ClockSource` at construction so tests can
/// drive cycles with fixed timestamps.
pub trait ClockSource: Send + Sync {
    /// Read the current calendar time
    fn now(&self) -> CalendarTime;
}

/// System clock backed by the host's local time
///
/// On the deployed device the local time is kept by a battery-backed RTC;
/// a dead battery makes it report its epoch default, which is how an
/// "unreadable" clock actually presents.
pub struct SystemClock;

/// Years before this are treated as an RTC that lost its time.
const MIN_PLAUSIBLE_YEAR: i32 = 2020;

impl SystemClock {
    /// Probe the clock once and construct the source.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Clock`] if the clock reads an implausible
    /// year. This aborts startup; there is no per-cycle retry.
    pub fn new() -> Result<Self> {
        let now = Local::now();
        if now.year() < MIN_PLAUSIBLE_YEAR {
            return Err(MonitorError::Clock(format!(
                "clock reports year {}; RTC battery likely dead",
                now.year()
            )));
        }
        Ok(Self)
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> CalendarTime {
        let now = Local::now();
        CalendarTime {
            year: now.year(),
            month: now.month(),
            day: now.day(),
            hour: now.hour(),
            minute: now.minute(),
            second: now.second(),
        }
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Clock that returns a fixed, settable time
    pub struct FixedClock {
        now: Mutex<CalendarTime>,
    }

    impl FixedClock {
        pub fn new(now: CalendarTime) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn set(&self, now: CalendarTime) {
            *self.now.lock().unwrap() = now;
        }
    }

    impl ClockSource for FixedClock {
        fn now(&self) -> CalendarTime {
            *self.now.lock().unwrap()
        }
    }
}
