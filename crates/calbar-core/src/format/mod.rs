//! Display formatting for the calendar menu.
//!
//! Pure functions turning classified events into text:
//! - [`countdown`], [`duration`], [`pluralize`]: the small building blocks
//! - [`header_text`]: the menu-bar title for a [`Classification`]
//! - [`MenuFormatter`]: event lines and the complete [`Menu`]
//!
//! Every function takes `now` explicitly; nothing reads the clock.
//!
//! # Example
//!
//! ```rust
//! use calbar_core::format::{countdown, duration};
//! use chrono::{TimeZone, Utc};
//!
//! let now = Utc.with_ymd_and_hms(2024, 1, 1, 8, 55, 0).unwrap();
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
//! let end = Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap();
//!
//! assert_eq!(countdown(start, now), "In 5 minutes");
//! assert_eq!(duration(start, end), "1h 30m");
//! ```

mod menu;

#[cfg(test)]
mod golden_tests;

use std::borrow::Cow;
use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::Classification;
use crate::event::NormalizedEvent;
use crate::links::LinkExtractor;

pub use menu::{Menu, MenuItem, MenuRenderer, SwiftBarRenderer};

/// Marker prefixed to events in progress.
pub const IN_PROGRESS_MARKER: &str = "🔴 ";

/// Header shown when no attendee meeting is left today.
pub const NO_MORE_MEETINGS: &str = "No more meetings";

/// Configuration options for menu formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatOptions {
    /// Maximum length for meeting titles (truncated with ellipsis).
    pub max_title_length: Option<usize>,
    /// Whether event lines end with the attendee count.
    pub show_attendees: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_title_length: None,
            show_attendees: true,
        }
    }
}

/// Returns `singular` when `count == 1`, otherwise `plural` or `singular + "s"`.
pub fn pluralize(count: i64, singular: &str, plural: Option<&str>) -> String {
    if count == 1 {
        singular.to_string()
    } else {
        plural.map_or_else(|| format!("{singular}s"), str::to_string)
    }
}

/// Human countdown to `start`: "Now", "In H hour(s)" or "In M minute(s)".
///
/// Elapsed seconds are truncated, never rounded up, so 59 seconds out is
/// still "Now" and 119 seconds is "In 1 minute".
pub fn countdown(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if start < now {
        return "Now".to_string();
    }

    let seconds = (start - now).num_seconds();
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    if hours > 0 {
        format!("In {} {}", hours, pluralize(hours, "hour", None))
    } else if minutes > 0 {
        format!("In {} {}", minutes, pluralize(minutes, "minute", None))
    } else {
        "Now".to_string()
    }
}

/// Length of an event as "Hh Mm", "Hh" or "Mm".
///
/// Uses the total span, so a one-day all-day event is "24h".
pub fn duration(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let seconds = (end - start).num_seconds().max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    match (hours, minutes) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Header text for the menu bar.
///
/// - next meeting with others after it: `"<countdown> • N more"`
/// - next meeting is the last one: `"<countdown> • No more"`
/// - a remaining count without a next meeting: the bare count
/// - nothing left: [`NO_MORE_MEETINGS`]
pub fn header_text(classification: &Classification, now: DateTime<Utc>) -> String {
    if classification.remaining_count == 0 {
        return NO_MORE_MEETINGS.to_string();
    }

    match classification.next_meeting() {
        Some(next) => {
            let more = classification.remaining_count - 1;
            let countdown = countdown(next.start, now);
            if more > 0 {
                format!("{countdown} • {more} more")
            } else {
                format!("{countdown} • No more")
            }
        }
        None => classification.remaining_count.to_string(),
    }
}

/// Formats events and menus with a shared link extractor and options.
#[derive(Debug, Clone, Default)]
pub struct MenuFormatter {
    options: FormatOptions,
    links: LinkExtractor,
}

impl MenuFormatter {
    pub fn new(options: FormatOptions, links: LinkExtractor) -> Self {
        Self { options, links }
    }

    pub fn links(&self) -> &LinkExtractor {
        &self.links
    }

    /// One menu line: `[🔴 ]9:00 AM - 9:30 AM (30m) • Title[ • N attendees]`.
    ///
    /// Times are shown in `tz`; the marker is present while the event is in progress.
    pub fn event_line<Tz>(&self, event: &NormalizedEvent, now: DateTime<Utc>, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let marker = if event.is_in_progress_at(now) {
            IN_PROGRESS_MARKER
        } else {
            ""
        };
        let start = event.start.with_timezone(tz).format("%-I:%M %p");
        let end = event.end.with_timezone(tz).format("%-I:%M %p");
        let title = self.truncate_title(event.title());

        let mut line = format!(
            "{marker}{start} - {end} ({}) • {title}",
            duration(event.start, event.end)
        );

        let attendees = event.attendee_count() as i64;
        if self.options.show_attendees && attendees > 0 {
            line.push_str(&format!(
                " • {} {}",
                attendees,
                pluralize(attendees, "attendee", None)
            ));
        }
        line
    }

    /// Builds the full menu: header, today's and tomorrow's sections, refresh.
    pub fn build_menu<Tz>(
        &self,
        classification: &Classification,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Menu
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let header = if classification.remaining_count == 0 {
            format!("😴 {NO_MORE_MEETINGS}")
        } else {
            format!("📅 {}", header_text(classification, now))
        };

        let mut menu = Menu::new(header);
        self.add_section(
            &mut menu,
            "Today",
            "No events today",
            &classification.today,
            now,
            tz,
        );
        menu.add_separator();
        self.add_section(
            &mut menu,
            "Tomorrow",
            "No events tomorrow",
            &classification.tomorrow,
            now,
            tz,
        );
        menu.add_separator();
        menu.add_refresh();
        menu
    }

    fn add_section<Tz>(
        &self,
        menu: &mut Menu,
        title: &str,
        empty_text: &str,
        events: &[NormalizedEvent],
        now: DateTime<Utc>,
        tz: &Tz,
    ) where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        menu.add_item(title);
        if events.is_empty() {
            menu.add_item(empty_text);
            return;
        }
        for event in events {
            let line = self.event_line(event, now, tz);
            match self.links.extract(&event.event) {
                Some(url) => menu.add_link(line, url),
                None => menu.add_item(line),
            }
        }
    }

    fn truncate_title<'a>(&self, title: &'a str) -> Cow<'a, str> {
        match self.options.max_title_length {
            Some(max) => ellipsis(title, max),
            None => Cow::Borrowed(title),
        }
    }
}

/// Truncates a string to `max_len` characters, ending in "…" when cut.
pub fn ellipsis(s: &str, max_len: usize) -> Cow<'_, str> {
    if max_len == 0 {
        return Cow::Borrowed("");
    }
    if s.chars().count() <= max_len {
        return Cow::Borrowed(s);
    }
    let truncated: String = s.chars().take(max_len - 1).collect();
    Cow::Owned(format!("{truncated}…"))
}
