//! One notification pass: lock, load, schedule, save, dispatch.

use calbar_core::NormalizedEvent;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::dispatch::Dispatcher;
use crate::error::NotifyResult;
use crate::ledger::LedgerStore;
use crate::scheduler::Scheduler;

/// Ties the scheduler to a ledger store and a dispatcher.
#[derive(Debug)]
pub struct Notifier<S, D> {
    scheduler: Scheduler,
    store: S,
    dispatcher: D,
}

impl<S: LedgerStore, D: Dispatcher> Notifier<S, D> {
    pub fn new(scheduler: Scheduler, store: S, dispatcher: D) -> Self {
        Self {
            scheduler,
            store,
            dispatcher,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Runs one pass and returns how many alerts the dispatcher accepted.
    ///
    /// The ledger is saved before anything is shown, so a crash or a failed
    /// dispatch loses an alert rather than repeating it.
    pub fn run<'a, I>(
        &self,
        today: &[NormalizedEvent],
        current_ids: I,
        now: DateTime<Utc>,
    ) -> NotifyResult<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let _lock = self.store.lock()?;
        let before = self.store.load()?;
        let (ledger, requests) = self
            .scheduler
            .schedule(before.clone(), today, current_ids, now);

        if ledger != before {
            self.store.save(&ledger)?;
        }

        let mut sent = 0;
        for request in &requests {
            match self.dispatcher.dispatch(request) {
                Ok(()) => {
                    info!(
                        event_id = %request.event_id,
                        title = %request.subtitle,
                        "notification sent"
                    );
                    sent += 1;
                }
                Err(e) => {
                    error!(event_id = %request.event_id, error = %e, "failed to send notification");
                }
            }
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RecordingDispatcher;
    use crate::ledger::{FileLedgerStore, Ledger, MemoryLedgerStore};
    use calbar_core::{Attendee, Event, EventDateTime};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 55, 0).unwrap()
    }

    fn today() -> Vec<NormalizedEvent> {
        let event = Event::new(
            "e1",
            EventDateTime::date_time("2024-01-01T09:00:00Z"),
            EventDateTime::date_time("2024-01-01T09:30:00Z"),
        )
        .with_summary("Standup")
        .with_attendee(Attendee::myself())
        .with_attendee(Attendee::other("ana@example.com"));
        vec![NormalizedEvent::from_event(event, &Utc).unwrap()]
    }

    #[test]
    fn dispatches_and_persists() {
        let events = today();
        let notifier = Notifier::new(
            Scheduler::default(),
            MemoryLedgerStore::default(),
            RecordingDispatcher::new(),
        );

        assert_eq!(notifier.run(&events, ["e1"], now()).unwrap(), 1);
        assert!(notifier.store().snapshot().contains("e1"));
        assert_eq!(
            notifier.dispatcher().sent()[0].body,
            "Starting in 5 minutes with 1 attendee"
        );

        assert_eq!(notifier.run(&events, ["e1"], now()).unwrap(), 0);
        assert_eq!(notifier.dispatcher().sent().len(), 1);
    }

    #[test]
    fn failed_dispatch_still_marks() {
        let events = today();
        let notifier = Notifier::new(
            Scheduler::default(),
            MemoryLedgerStore::default(),
            RecordingDispatcher::failing(),
        );

        assert_eq!(notifier.run(&events, ["e1"], now()).unwrap(), 0);
        assert!(notifier.store().snapshot().contains("e1"));
        notifier.run(&events, ["e1"], now()).unwrap();
        assert_eq!(notifier.dispatcher().sent().len(), 1);
    }

    #[test]
    fn file_store_survives_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notified.json");
        let events = today();

        for _ in 0..3 {
            let notifier = Notifier::new(
                Scheduler::default(),
                FileLedgerStore::new(&path),
                RecordingDispatcher::new(),
            );
            notifier.run(&events, ["e1", "e2"], now()).unwrap();
        }

        let stored = FileLedgerStore::new(&path).load().unwrap();
        assert_eq!(stored, ["e1"].into_iter().collect::<Ledger>());
    }

    #[test]
    fn unchanged_ledger_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notified.json");
        let notifier = Notifier::new(
            Scheduler::default(),
            FileLedgerStore::new(&path),
            RecordingDispatcher::new(),
        );
        notifier.run(&[], std::iter::empty(), now()).unwrap();
        assert!(!path.exists());
    }
}
