//! Event types for calendar events.
//!
//! - [`Event`]: the provider's event as received (Google Calendar v3 field names)
//! - [`NormalizedEvent`]: an event with resolved instants, recomputed every run

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{EventTime, TimeParseError, parse_event_time};

/// Placeholder title for events without a summary.
pub const UNTITLED_EVENT: &str = "Untitled Event";

/// A calendar event as returned by the provider.
///
/// Only the fields the menu and notifications need are modeled. Unknown
/// fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Stable id, unique per meeting instance.
    pub id: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Attendee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hangout_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_data: Option<ConferenceData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Start or end of an event: a `date` for all-day events, a `dateTime` otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    /// Creates a timed value.
    pub fn date_time(value: impl Into<String>) -> Self {
        Self {
            date_time: Some(value.into()),
            ..Default::default()
        }
    }

    /// Creates an all-day value.
    pub fn date(value: impl Into<String>) -> Self {
        Self {
            date: Some(value.into()),
            ..Default::default()
        }
    }

    /// The raw timestamp, preferring `dateTime` over `date`.
    pub fn raw(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }

    /// Parses the raw timestamp.
    pub fn parse(&self) -> Result<EventTime, TimeParseError> {
        parse_event_time(self.raw().unwrap_or_default())
    }
}

/// An event attendee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether this entry is the calendar owner. Absent means `false`.
    #[serde(rename = "self", default)]
    pub is_self: bool,
}

impl Attendee {
    /// An attendee other than the calendar owner.
    pub fn other(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            is_self: false,
        }
    }

    /// The calendar owner.
    pub fn myself() -> Self {
        Self {
            email: None,
            is_self: true,
        }
    }
}

/// Conference information attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceData {
    #[serde(default)]
    pub entry_points: Vec<EntryPoint>,
}

/// A way to join a conference (video, phone, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl EntryPoint {
    pub fn new(kind: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            entry_point_type: Some(kind.into()),
            uri: Some(uri.into()),
        }
    }

    /// Returns `true` for video entry points.
    pub fn is_video(&self) -> bool {
        self.entry_point_type.as_deref() == Some("video")
    }
}

impl Event {
    /// Creates a timed event with no attendees.
    pub fn new(id: impl Into<String>, start: EventDateTime, end: EventDateTime) -> Self {
        Self {
            id: id.into(),
            start,
            end,
            ..Default::default()
        }
    }

    /// Sets the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Adds an attendee.
    pub fn with_attendee(mut self, attendee: Attendee) -> Self {
        self.attendees.push(attendee);
        self
    }

    /// Sets the hangout link.
    pub fn with_hangout_link(mut self, link: impl Into<String>) -> Self {
        self.hangout_link = Some(link.into());
        self
    }

    /// Adds a conference entry point.
    pub fn with_entry_point(mut self, entry_point: EntryPoint) -> Self {
        self.conference_data
            .get_or_insert_with(ConferenceData::default)
            .entry_points
            .push(entry_point);
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// The summary, or [`UNTITLED_EVENT`] when absent.
    pub fn title(&self) -> &str {
        self.summary.as_deref().unwrap_or(UNTITLED_EVENT)
    }

    /// Number of attendees other than the calendar owner.
    pub fn attendee_count(&self) -> usize {
        self.attendees.iter().filter(|a| !a.is_self).count()
    }
}

/// An event with resolved start and end instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub event: Event,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The source start had no time component.
    pub is_all_day: bool,
}

impl NormalizedEvent {
    /// Resolves an event's timestamps, with all-day dates taken in `tz`.
    ///
    /// Fails when a timestamp does not parse or the event ends before it starts.
    pub fn from_event<Tz: TimeZone>(event: Event, tz: &Tz) -> Result<Self, TimeParseError> {
        let start_time = event.start.parse()?;
        let end_time = event.end.parse()?;
        let start = start_time.to_instant(tz);
        let end = end_time.to_instant(tz);
        if end < start {
            return Err(TimeParseError::EndBeforeStart { start, end });
        }
        Ok(Self {
            event,
            start,
            end,
            is_all_day: start_time.is_all_day(),
        })
    }

    pub fn id(&self) -> &str {
        &self.event.id
    }

    pub fn title(&self) -> &str {
        self.event.title()
    }

    pub fn attendee_count(&self) -> usize {
        self.event.attendee_count()
    }

    /// `start <= now <= end`.
    pub fn is_in_progress_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    /// Not yet ended and shared with at least one other attendee.
    pub fn is_pending_meeting_at(&self, now: DateTime<Utc>) -> bool {
        self.end > now && self.attendee_count() > 0
    }
}
