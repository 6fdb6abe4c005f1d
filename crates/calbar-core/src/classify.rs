//! Today / tomorrow bucketing and next-meeting selection.

use chrono::{DateTime, Days, TimeZone, Utc};
use tracing::{debug, warn};

use crate::event::{Event, NormalizedEvent};

/// Result of classifying one fetch worth of events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Today's events, in provider (start time) order.
    pub today: Vec<NormalizedEvent>,
    /// Tomorrow's events, in provider order.
    pub tomorrow: Vec<NormalizedEvent>,
    /// Today's events that have not ended and have other attendees.
    pub remaining_count: usize,
    next_index: Option<usize>,
    /// Events dropped because their timestamps did not normalize.
    pub skipped: usize,
}

impl Classification {
    /// First of today's events that has not ended and has other attendees.
    ///
    /// An in-progress meeting qualifies.
    pub fn next_meeting(&self) -> Option<&NormalizedEvent> {
        self.next_index.map(|i| &self.today[i])
    }
}

/// Buckets `events` by the local date of their start.
///
/// `local_reference` decides which dates are "today" and "tomorrow" and which
/// timezone all-day dates resolve in. Events outside both days are ignored.
/// Duplicated ids are kept as-is.
pub fn classify<Tz: TimeZone>(
    events: impl IntoIterator<Item = Event>,
    now: DateTime<Utc>,
    local_reference: &DateTime<Tz>,
) -> Classification {
    let tz = local_reference.timezone();
    let today = local_reference.date_naive();
    let tomorrow = today.checked_add_days(Days::new(1));

    let mut result = Classification::default();
    for event in events {
        let id = event.id.clone();
        let normalized = match NormalizedEvent::from_event(event, &tz) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(event_id = %id, error = %e, "skipping malformed event");
                result.skipped += 1;
                continue;
            }
        };

        let date = normalized.start.with_timezone(&tz).date_naive();
        if date == today {
            if normalized.is_pending_meeting_at(now) {
                result.remaining_count += 1;
                if result.next_index.is_none() {
                    result.next_index = Some(result.today.len());
                }
            }
            result.today.push(normalized);
        } else if Some(date) == tomorrow {
            result.tomorrow.push(normalized);
        }
    }

    debug!(
        today = result.today.len(),
        tomorrow = result.tomorrow.len(),
        remaining = result.remaining_count,
        skipped = result.skipped,
        "classified events"
    );
    result
}
