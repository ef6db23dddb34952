//! Civil date/time normalization in a single fixed UTC offset.
//!
//! Every date comparison in the crate happens on values produced here: civil
//! dates and minute-precision times interpreted in the configured zone. Raw
//! instants are projected into that zone once, at this boundary, and never
//! compared across zones afterwards.

use crate::error::{TaskError, TaskResult};
use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Timelike, Utc,
};
use std::sync::Mutex;

/// Canonical format for stored civil dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical format for stored times of day.
pub const TIME_FORMAT: &str = "%H:%M";

/// Canonical format for due instants (matches the `due_at` column).
pub const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Source of "now" in the configured civil zone.
pub trait Clock: Send + Sync {
    /// Current civil date and time in the configured zone.
    fn now(&self) -> NaiveDateTime;

    /// The fixed offset this clock reports in.
    fn offset(&self) -> FixedOffset;

    /// Current civil date.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Wall clock projected into a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(utc_offset())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Manually driven clock for deterministic tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
            offset: utc_offset(),
        }
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Jump to an absolute civil time.
    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap() = now;
    }

    /// Move forward (or backward, for negative durations).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// Parse a `+HH:MM` / `-HH:MM` / `Z` offset string.
pub fn parse_utc_offset(input: &str) -> TaskResult<FixedOffset> {
    let s = input.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(utc_offset());
    }

    let invalid = || TaskError::validation("utc_offset", &format!("Invalid UTC offset: {}", input));

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Normalize an externally supplied date string to a civil date in `offset`.
///
/// Accepts a bare `YYYY-MM-DD`, a naive `YYYY-MM-DDTHH:MM[:SS]` (already civil),
/// or an RFC 3339 timestamp, which is projected into `offset` before the date
/// is taken.
pub fn to_civil_date(input: &str, offset: FixedOffset) -> TaskResult<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return Err(TaskError::validation("date", "Date is empty"));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Ok(date);
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Ok(instant.with_timezone(&offset).date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.date());
        }
    }

    Err(TaskError::validation(
        "date",
        &format!("Invalid date '{}': expected YYYY-MM-DD or RFC 3339", input),
    ))
}

/// Parse an `HH:MM` (or `HH:MM:SS`) time of day, truncated to the minute.
///
/// An empty string yields midnight.
pub fn parse_time_of_day(input: &str) -> TaskResult<NaiveTime> {
    let s = input.trim();
    if s.is_empty() {
        return Ok(NaiveTime::MIN);
    }

    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, TIME_FORMAT))
        .map(truncate_to_minute)
        .map_err(|_| {
            TaskError::validation(
                "time_due",
                &format!("Invalid time '{}': expected HH:MM", input),
            )
        })
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

/// Combine a civil date and time of day into the instant they name.
pub fn due_instant(due_date: NaiveDate, time_due: NaiveTime) -> NaiveDateTime {
    due_date.and_time(time_due)
}

/// Civil midnight starting the given date.
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Format an instant the way the `due_at` column stores it, dropping seconds.
pub fn format_instant(instant: NaiveDateTime) -> String {
    instant.format(INSTANT_FORMAT).to_string()
}
