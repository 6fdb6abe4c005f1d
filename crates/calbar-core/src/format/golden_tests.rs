//! Golden tests for the rendered SwiftBar menu.
//!
//! These tests use insta inline snapshots to keep the plugin output stable.
//! Run with `cargo insta review` to update them after intentional changes.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::classify::classify;
use crate::event::{Attendee, Event, EventDateTime};
use crate::format::{MenuFormatter, MenuRenderer, SwiftBarRenderer};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

fn timed(summary: &str, start: &str, end: &str) -> Event {
    Event::new(
        summary.to_lowercase().replace(' ', "-"),
        EventDateTime::date_time(start),
        EventDateTime::date_time(end),
    )
    .with_summary(summary)
}

fn sample_day() -> Vec<Event> {
    vec![
        timed("Standup", "2024-01-01T09:00:00Z", "2024-01-01T09:30:00Z")
            .with_attendee(Attendee::myself())
            .with_attendee(Attendee::other("ana@example.com"))
            .with_hangout_link("https://meet.google.com/abc-defg-hij"),
        timed("Focus time", "2024-01-01T10:00:00Z", "2024-01-01T12:00:00Z")
            .with_attendee(Attendee::myself()),
        timed(
            "Design review",
            "2024-01-01T13:00:00Z",
            "2024-01-01T14:15:00Z",
        )
        .with_attendee(Attendee::other("ana@example.com"))
        .with_attendee(Attendee::other("bo@example.com"))
        .with_description("Zoom: https://acme.zoom.us/j/123 (passcode in invite)"),
        Event::new(
            "offsite",
            EventDateTime::date("2024-01-02"),
            EventDateTime::date("2024-01-03"),
        )
        .with_summary("Company offsite"),
    ]
}

fn render<Tz>(events: Vec<Event>, now: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let local = now.with_timezone(tz);
    let classification = classify(events, now, &local);
    let menu = MenuFormatter::default().build_menu(&classification, now, tz);
    SwiftBarRenderer::new("/usr/local/bin/calbar")
        .render(&menu)
        .trim_end()
        .to_string()
}

#[test]
fn morning_with_upcoming_meetings() {
    let output = render(sample_day(), utc(2024, 1, 1, 8, 55, 0), &Utc);
    insta::assert_snapshot!(output, @r"
    📅 In 5 minutes • 1 more
    ---
    Today
    9:00 AM - 9:30 AM (30m) • Standup • 1 attendee | href=https://meet.google.com/abc-defg-hij
    10:00 AM - 12:00 PM (2h) • Focus time
    1:00 PM - 2:15 PM (1h 15m) • Design review • 2 attendees | href=https://acme.zoom.us/j/123
    ---
    Tomorrow
    12:00 AM - 12:00 AM (24h) • Company offsite
    ---
    Refresh | refresh=true
    ");
}

#[test]
fn meeting_in_progress() {
    let tz = FixedOffset::east_opt(3600).unwrap();
    let events = vec![
        timed(
            "Incident review",
            "2024-01-01T09:00:00Z",
            "2024-01-01T09:30:00Z",
        )
        .with_attendee(Attendee::other("a@example.com"))
        .with_attendee(Attendee::other("b@example.com"))
        .with_attendee(Attendee::other("c@example.com")),
    ];
    let output = render(events, utc(2024, 1, 1, 9, 10, 0), &tz);
    insta::assert_snapshot!(output, @r"
    📅 Now • No more
    ---
    Today
    🔴 10:00 AM - 10:30 AM (30m) • Incident review • 3 attendees
    ---
    Tomorrow
    No events tomorrow
    ---
    Refresh | refresh=true
    ");
}

#[test]
fn evening_after_last_meeting() {
    let events = sample_day().into_iter().take(3).collect();
    let output = render(events, utc(2024, 1, 1, 18, 0, 0), &Utc);
    insta::assert_snapshot!(output, @r"
    😴 No more meetings
    ---
    Today
    9:00 AM - 9:30 AM (30m) • Standup • 1 attendee | href=https://meet.google.com/abc-defg-hij
    10:00 AM - 12:00 PM (2h) • Focus time
    1:00 PM - 2:15 PM (1h 15m) • Design review • 2 attendees | href=https://acme.zoom.us/j/123
    ---
    Tomorrow
    No events tomorrow
    ---
    Refresh | refresh=true
    ");
}

#[test]
fn empty_calendar() {
    let output = render(Vec::new(), utc(2024, 1, 1, 8, 0, 0), &Utc);
    insta::assert_snapshot!(output, @r"
    😴 No more meetings
    ---
    Today
    No events today
    ---
    Tomorrow
    No events tomorrow
    ---
    Refresh | refresh=true
    ");
}
