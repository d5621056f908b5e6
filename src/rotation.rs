//! # Log Rotation Module
//!
//! Decides which rotating log file a reading belongs to and whether the
//! current cycle's reading is due to be persisted.
//!
//! Two interchangeable policies exist because the two deployed monitors
//! rotate differently:
//! - **Daily**: one file per calendar day (`readings_YYYYMMDD.csv`),
//!   every cycle's reading is written.
//! - **Weekly**: one file per ISO-8601 week (`week{N}.csv`), at most one
//!   reading per distinct clock hour.
//!
//! The ISO week number is computed from first principles rather than
//! delegated to a date library, because the boundary behavior (week 53
//! vs week 1 of the next year, the first days of January belonging to
//! the previous year's last week) is part of the on-disk file naming
//! contract and must stay reproducible.

use chrono::{Datelike, NaiveDate};

use crate::clock::CalendarTime;

/// Log file rotation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    /// One file per calendar day; every reading is logged.
    Daily,
    /// One file per ISO week; at most one reading per clock hour.
    Weekly,
}

impl RotationPolicy {
    /// Parse a policy from its configuration name (`"daily"` / `"weekly"`).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            _ => None,
        }
    }

    /// Select the rotation key for a timestamp.
    ///
    /// A reading belongs to exactly one key; the key and the fixed naming
    /// template fully determine the log file (files are never renamed).
    pub fn route(&self, now: &CalendarTime) -> RotationKey {
        match self {
            Self::Daily => RotationKey::Day {
                year: now.year,
                month: now.month,
                day: now.day,
            },
            Self::Weekly => {
                RotationKey::Week(iso_week_number(now.year, now.month, now.day).unwrap_or(1))
            }
        }
    }

    /// Whether the current cycle's reading should be persisted.
    ///
    /// Daily policy logs every cycle. Weekly policy logs at most once per
    /// distinct `(year, month, day, hour)`; a missing or unparsable
    /// previous timestamp counts as due, favoring logging over silently
    /// dropping data.
    pub fn is_due(&self, now: &CalendarTime, state: &RotationState) -> bool {
        match self {
            Self::Daily => true,
            Self::Weekly => match state.last_written_timestamp() {
                None => true,
                Some(raw) => match CalendarTime::parse(raw) {
                    // Fail open on a corrupt stored timestamp
                    None => true,
                    Some(prev) => {
                        prev.year != now.year
                            || prev.month != now.month
                            || prev.day != now.day
                            || prev.hour != now.hour
                    }
                },
            },
        }
    }
}

/// Identifier selecting which rotating log file a reading belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationKey {
    /// Calendar day (daily scheme)
    Day { year: i32, month: u32, day: u32 },
    /// ISO-8601 week number (weekly scheme)
    Week(u32),
}

impl RotationKey {
    /// Log file name for this key.
    ///
    /// Daily: `readings_YYYYMMDD.csv`. Weekly: `week{N}.csv` with no
    /// zero-padding on N. Both formats are part of the on-disk contract.
    pub fn filename(&self) -> String {
        match self {
            Self::Day { year, month, day } => {
                format!("readings_{:04}{:02}{:02}.csv", year, month, day)
            }
            Self::Week(n) => format!("week{}.csv", n),
        }
    }
}

/// Per-process state the weekly granularity policy decides against.
///
/// Owned exclusively by the monitoring loop; seeded empty at startup and
/// updated exactly once per log-worthy cycle. The timestamp is kept in
/// its formatted string form and re-parsed on each due-ness check so a
/// corrupt value degrades to "due" instead of wedging the policy.
#[derive(Debug, Default)]
pub struct RotationState {
    last_written_key: Option<RotationKey>,
    last_written_timestamp: Option<String>,
}

impl RotationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a reading was written under `key` at `now`.
    pub fn record_write(&mut self, key: RotationKey, now: &CalendarTime) {
        self.last_written_key = Some(key);
        self.last_written_timestamp = Some(now.to_string());
    }

    pub fn last_written_key(&self) -> Option<&RotationKey> {
        self.last_written_key.as_ref()
    }

    pub fn last_written_timestamp(&self) -> Option<&str> {
        self.last_written_timestamp.as_deref()
    }

    #[cfg(test)]
    pub fn with_last_written_timestamp(raw: &str) -> Self {
        Self {
            last_written_key: None,
            last_written_timestamp: Some(raw.to_string()),
        }
    }
}

/// ISO-8601 week number (1-53) for a calendar date.
///
/// Computed as `week = (ordinal_day - iso_weekday + 10) div 7` with two
/// boundary fixups:
/// - `week < 1`: the date belongs to the last week of the previous year,
///   found by evaluating December 31 of that year.
/// - `week == 53` when December 31 of the same year falls on Monday,
///   Tuesday, or Wednesday: the date belongs to week 1 of the next year.
///
/// Returns `None` for calendar-invalid dates.
///
/// # Examples
///
/// ```
/// use co2_monitor::rotation::iso_week_number;
///
/// // Dec 31 2024 is a Tuesday, so it already belongs to week 1 of 2025
/// assert_eq!(iso_week_number(2024, 12, 31), Some(1));
/// ```
pub fn iso_week_number(year: i32, month: u32, day: u32) -> Option<u32> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(week_number(date, false))
}

fn week_number(date: NaiveDate, recursed: bool) -> u32 {
    let ordinal = date.ordinal() as i32;
    let weekday = date.weekday().number_from_monday() as i32;
    let week = (ordinal - weekday + 10) / 7;

    if week < 1 {
        // At most one recursive step: Dec 31 can never itself yield
        // week < 1, so the guard only trips on adversarial inputs.
        if recursed {
            return 1;
        }
        return match NaiveDate::from_ymd_opt(date.year() - 1, 12, 31) {
            Some(prev_dec31) => week_number(prev_dec31, true),
            None => 1,
        };
    }

    if week == 53 {
        if let Some(dec31) = NaiveDate::from_ymd_opt(date.year(), 12, 31) {
            if (dec31.weekday().number_from_monday() as i32) < 4 {
                return 1;
            }
        }
    }

    week as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> CalendarTime {
        CalendarTime::new(year, month, day, hour, minute, second)
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(RotationPolicy::parse("daily"), Some(RotationPolicy::Daily));
        assert_eq!(
            RotationPolicy::parse("weekly"),
            Some(RotationPolicy::Weekly)
        );
        assert_eq!(RotationPolicy::parse("hourly"), None);
        assert_eq!(RotationPolicy::parse(""), None);
    }

    #[test]
    fn test_daily_route_same_day_same_file() {
        let policy = RotationPolicy::Daily;
        let morning = policy.route(&at(2025, 7, 20, 10, 0, 0));
        let afternoon = policy.route(&at(2025, 7, 20, 14, 0, 0));
        assert_eq!(morning, afternoon);
        assert_eq!(morning.filename(), "readings_20250720.csv");
    }

    #[test]
    fn test_daily_route_rolls_over_at_midnight() {
        let policy = RotationPolicy::Daily;
        let next_day = policy.route(&at(2025, 7, 21, 0, 0, 1));
        assert_eq!(next_day.filename(), "readings_20250721.csv");
    }

    #[test]
    fn test_weekly_filename_has_no_padding() {
        assert_eq!(RotationKey::Week(7).filename(), "week7.csv");
        assert_eq!(RotationKey::Week(33).filename(), "week33.csv");
    }

    #[test]
    fn test_iso_week_known_dates() {
        // Week 1 is the week containing the year's first Thursday
        assert_eq!(iso_week_number(2025, 1, 1), Some(1));
        assert_eq!(iso_week_number(2025, 8, 11), Some(33));
        // Dec 31 2024 (Tuesday) belongs to week 1 of 2025
        assert_eq!(iso_week_number(2024, 12, 31), Some(1));
        // Jan 1 2021 (Friday) belongs to week 53 of 2020
        assert_eq!(iso_week_number(2021, 1, 1), Some(53));
        // Jan 1 2027 (Friday) belongs to week 53 of 2026
        assert_eq!(iso_week_number(2027, 1, 1), Some(53));
        // Jan 1 2028 (Saturday) belongs to week 52 of 2027
        assert_eq!(iso_week_number(2028, 1, 1), Some(52));
    }

    #[test]
    fn test_iso_week_in_range_for_year_sweep() {
        for year in 2020..=2030 {
            for month in 1..=12 {
                for day in 1..=28 {
                    let week = iso_week_number(year, month, day).unwrap();
                    assert!(
                        (1..=53).contains(&week),
                        "{}-{}-{} produced week {}",
                        year,
                        month,
                        day,
                        week
                    );
                }
            }
        }
    }

    #[test]
    fn test_iso_week_invalid_date() {
        assert_eq!(iso_week_number(2025, 2, 30), None);
        assert_eq!(iso_week_number(2025, 0, 1), None);
    }

    #[test]
    fn test_daily_always_due() {
        let policy = RotationPolicy::Daily;
        let now = at(2025, 8, 11, 9, 45, 0);
        let mut state = RotationState::new();
        assert!(policy.is_due(&now, &state));

        state.record_write(policy.route(&now), &now);
        // Same second again: daily still logs every cycle
        assert!(policy.is_due(&now, &state));
    }

    #[test]
    fn test_weekly_due_on_empty_state() {
        let policy = RotationPolicy::Weekly;
        assert!(policy.is_due(&at(2025, 8, 11, 9, 30, 0), &RotationState::new()));
    }

    #[test]
    fn test_weekly_not_due_within_same_hour() {
        let policy = RotationPolicy::Weekly;
        let state = RotationState::with_last_written_timestamp("2025-08-11 09:30:00");
        assert!(!policy.is_due(&at(2025, 8, 11, 9, 45, 0), &state));
    }

    #[test]
    fn test_weekly_due_in_next_hour() {
        let policy = RotationPolicy::Weekly;
        let state = RotationState::with_last_written_timestamp("2025-08-11 09:30:00");
        assert!(policy.is_due(&at(2025, 8, 11, 10, 5, 0), &state));
    }

    #[test]
    fn test_weekly_due_same_hour_next_day() {
        let policy = RotationPolicy::Weekly;
        let state = RotationState::with_last_written_timestamp("2025-08-11 09:30:00");
        assert!(policy.is_due(&at(2025, 8, 12, 9, 30, 0), &state));
    }

    #[test]
    fn test_weekly_fails_open_on_unparsable_timestamp() {
        let policy = RotationPolicy::Weekly;
        let state = RotationState::with_last_written_timestamp("garbage");
        assert!(policy.is_due(&at(2025, 8, 11, 9, 45, 0), &state));
    }

    #[test]
    fn test_record_write_updates_state() {
        let policy = RotationPolicy::Weekly;
        let now = at(2025, 8, 11, 9, 30, 0);
        let mut state = RotationState::new();
        let key = policy.route(&now);

        state.record_write(key, &now);
        assert_eq!(state.last_written_key(), Some(&RotationKey::Week(33)));
        assert_eq!(
            state.last_written_timestamp(),
            Some("2025-08-11 09:30:00")
        );
    }

    #[test]
    fn test_weekly_route_matches_week_number() {
        let policy = RotationPolicy::Weekly;
        let key = policy.route(&at(2024, 12, 31, 12, 0, 0));
        assert_eq!(key, RotationKey::Week(1));
        assert_eq!(key.filename(), "week1.csv");
    }
}
