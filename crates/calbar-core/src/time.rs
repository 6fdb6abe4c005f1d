//! Time types for calendar events.
//!
//! This module turns provider timestamps into timezone-aware instants:
//! - [`EventTime`]: either a specific instant or an all-day date
//! - [`parse_event_time`]: parses the provider's string forms
//! - [`TimeWindow`]: a half-open `[start, end)` range, used for the fetch window
//!
//! # Normalization rules
//!
//! - A string without a `T` is a date (`2024-01-02`) and marks an all-day
//!   event. It resolves to local midnight of that date.
//! - A date-time ending in `Z` is UTC.
//! - A date-time with a numeric offset (`+02:00`) carries its own offset.
//! - A date-time with no offset at all is **treated as UTC**. This is an
//!   explicit rule: Google Calendar always sends an offset, so this branch only
//!   fires for hand-written or foreign data, and it is logged at debug level.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors raised while normalizing event timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("empty timestamp")]
    Empty,

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("invalid date-time '{0}'")]
    InvalidDateTime(String),

    #[error("event ends ({end}) before it starts ({start})")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Represents the time of a calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific instant, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day date (no time component).
    AllDay(NaiveDate),
}

impl EventTime {
    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Resolves this time to an instant.
    ///
    /// All-day dates resolve to midnight in `tz`.
    pub fn to_instant<Tz: TimeZone>(&self, tz: &Tz) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => local_midnight(*date, tz),
        }
    }
}

/// Parses a provider timestamp.
///
/// See the module docs for the normalization rules.
pub fn parse_event_time(raw: &str) -> Result<EventTime, TimeParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(TimeParseError::Empty);
    }

    if !raw.contains('T') {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(EventTime::AllDay)
            .map_err(|_| TimeParseError::InvalidDate(raw.to_string()));
    }

    if let Some(naive) = raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        return parse_naive(naive)
            .map(|dt| EventTime::DateTime(dt.and_utc()))
            .ok_or_else(|| TimeParseError::InvalidDateTime(raw.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(EventTime::DateTime(dt.with_timezone(&Utc)));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z") {
        return Ok(EventTime::DateTime(dt.with_timezone(&Utc)));
    }

    match parse_naive(raw) {
        Some(naive) => {
            debug!(timestamp = raw, "timestamp has no offset, treating as UTC");
            Ok(EventTime::DateTime(naive.and_utc()))
        }
        None => Err(TimeParseError::InvalidDateTime(raw.to_string())),
    }
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Returns the instant of midnight on `date` in `tz`.
///
/// When midnight does not exist locally (a DST gap at 00:00), the date is
/// taken as UTC midnight instead.
pub fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

/// A half-open time window `[start, end)` in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    /// Local day boundaries around `reference`: from the start of its local
    /// day to the start of the day two days later.
    ///
    /// This is the fetch window covering "today" and "tomorrow".
    pub fn local_days<Tz: TimeZone>(reference: &DateTime<Tz>) -> Self {
        let tz = reference.timezone();
        let today = reference.date_naive();
        let day_after_tomorrow = today.checked_add_days(Days::new(2)).unwrap_or(today);
        Self {
            start: local_midnight(today, &tz),
            end: local_midnight(day_after_tomorrow, &tz),
        }
    }

    /// Returns `true` if the given instant falls within this window.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        dt >= self.start && dt < self.end
    }

    /// `timeMin` / `timeMax` query values as RFC 3339 UTC strings.
    pub fn to_rfc3339(&self) -> (String, String) {
        (
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }
}
