//! Core types: time, events, links, classification, formatting

pub mod classify;
pub mod event;
pub mod format;
pub mod links;
pub mod time;
pub mod tracing;

pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
pub use classify::{Classification, classify};
pub use event::{Attendee, ConferenceData, EntryPoint, Event, EventDateTime, NormalizedEvent};
pub use format::{
    FormatOptions, Menu, MenuFormatter, MenuItem, MenuRenderer, SwiftBarRenderer, countdown,
    duration, ellipsis, header_text, pluralize,
};
pub use links::{LinkExtractor, LinkPattern, LinkPatternError, LinkPatterns, unwrap_safelink};
pub use time::{EventTime, TimeParseError, TimeWindow, parse_event_time};
