//! Decides which meetings get a "starting soon" alert on this invocation.
//!
//! Each event id moves from unnotified to notified exactly once: the first
//! poll that sees its start inside the trigger window emits a dispatch and
//! marks the id in the ledger. A window missed entirely is not retried.

use std::ops::RangeInclusive;

use calbar_core::{LinkExtractor, NormalizedEvent, pluralize};
use chrono::{DateTime, Utc};
use tracing::{debug, info, trace};

use crate::ledger::Ledger;

pub const NOTIFICATION_TITLE: &str = "Meeting Starting Soon";

/// Seconds before start in which an alert may fire: 4 to 6 minutes, wide
/// enough that a 60 s poll cadence lands in it once or twice.
pub const DEFAULT_WINDOW_SECS: RangeInclusive<i64> = 240..=360;

/// One alert to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub event_id: String,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    window: RangeInclusive<i64>,
    links: LinkExtractor,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(LinkExtractor::default())
    }
}

impl Scheduler {
    pub fn new(links: LinkExtractor) -> Self {
        Self {
            window: DEFAULT_WINDOW_SECS,
            links,
        }
    }

    /// Replaces the trigger window, in seconds before start (inclusive).
    pub fn with_window(mut self, window: RangeInclusive<i64>) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> &RangeInclusive<i64> {
        &self.window
    }

    /// Prunes `ledger` to `current_ids`, then emits one request for each of
    /// `today` that is unnotified, attendee-bearing and due, marking it.
    ///
    /// `current_ids` are the ids of every event in the fetch window, not just
    /// today's.
    pub fn schedule<'a, I>(
        &self,
        mut ledger: Ledger,
        today: &[NormalizedEvent],
        current_ids: I,
        now: DateTime<Utc>,
    ) -> (Ledger, Vec<DispatchRequest>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let pruned = ledger.prune(current_ids);
        if pruned > 0 {
            debug!(pruned, remaining = ledger.len(), "pruned ledger");
        }

        let mut dispatches = Vec::new();
        for event in today {
            if ledger.contains(event.id()) {
                trace!(event_id = %event.id(), "already notified");
                continue;
            }

            let seconds_until = (event.start - now).num_seconds();
            let attendees = event.attendee_count();
            if !self.window.contains(&seconds_until) || attendees == 0 {
                continue;
            }

            info!(event_id = %event.id(), seconds_until, "meeting starting soon");
            ledger.mark(event.id());
            dispatches.push(self.request_for(event, attendees));
        }

        (ledger, dispatches)
    }

    fn request_for(&self, event: &NormalizedEvent, attendees: usize) -> DispatchRequest {
        let count = attendees as i64;
        DispatchRequest {
            event_id: event.id().to_string(),
            title: NOTIFICATION_TITLE.to_string(),
            subtitle: event.title().to_string(),
            body: format!(
                "Starting in 5 minutes with {count} {}",
                pluralize(count, "attendee", None)
            ),
            link: self.links.extract(&event.event),
        }
    }
}
