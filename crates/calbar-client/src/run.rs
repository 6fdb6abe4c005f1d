//! One plugin invocation: credentials, fetch, classify, notify, menu.

use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, error, info, warn};

use calbar_core::{Menu, MenuFormatter, TimeWindow, classify};
use calbar_notify::{DesktopDispatcher, Dispatcher, FileLedgerStore, LedgerStore, Notifier};
use calbar_providers::{CalendarProvider, CredentialProvider, ListEventsRequest, ProviderError};

/// How a run ended. Every variant renders to a menu.
#[derive(Debug)]
pub enum Outcome {
    /// No usable login, or the stored one was rejected.
    AuthRequired,
    /// Credentials or the events listing failed for another reason.
    FetchFailed(ProviderError),
    Rendered(Menu),
}

impl Outcome {
    pub fn into_menu(self) -> Menu {
        match self {
            Self::AuthRequired => Menu::auth_required(),
            Self::FetchFailed(e) => Menu::fetch_error(e.message()),
            Self::Rendered(menu) => menu,
        }
    }
}

/// Everything one invocation needs, wired once in `main`.
pub struct Plugin<S = FileLedgerStore, D = DesktopDispatcher> {
    credentials: Box<dyn CredentialProvider>,
    calendar: Box<dyn CalendarProvider>,
    calendar_id: String,
    formatter: MenuFormatter,
    notifier: Option<Notifier<S, D>>,
}

impl<S: LedgerStore, D: Dispatcher> Plugin<S, D> {
    pub fn new(
        credentials: Box<dyn CredentialProvider>,
        calendar: Box<dyn CalendarProvider>,
        calendar_id: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            calendar,
            calendar_id: calendar_id.into(),
            formatter: MenuFormatter::default(),
            notifier: None,
        }
    }

    pub fn with_formatter(mut self, formatter: MenuFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier<S, D>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn notifier(&self) -> Option<&Notifier<S, D>> {
        self.notifier.as_ref()
    }

    /// Runs once at `now`, whose timezone decides "today" and "tomorrow".
    ///
    /// Notification failures are logged and never change the outcome.
    pub async fn run<Tz>(&self, now: &DateTime<Tz>) -> Outcome
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let token = match self.credentials.get_credentials().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                info!("no usable login");
                return Outcome::AuthRequired;
            }
            Err(e) if e.is_auth_error() => {
                warn!(error = %e, "credentials rejected");
                return Outcome::AuthRequired;
            }
            Err(e) => {
                error!(error = %e, "failed to obtain credentials");
                return Outcome::FetchFailed(e);
            }
        };

        let request = ListEventsRequest::new(&self.calendar_id, TimeWindow::local_days(now));
        let fetched = match self.calendar.list_events(&token, request).await {
            Ok(fetched) => fetched,
            Err(e) if e.is_auth_error() => {
                warn!(error = %e, "calendar rejected the token");
                return Outcome::AuthRequired;
            }
            Err(e) => {
                error!(error = %e, "failed to list events");
                return Outcome::FetchFailed(e);
            }
        };
        debug!(
            provider = self.calendar.name(),
            events = fetched.events.len(),
            skipped = fetched.skipped,
            "fetched events"
        );

        let ids: Vec<String> = fetched.events.iter().map(|e| e.id.clone()).collect();
        let now_utc = now.with_timezone(&Utc);
        let classification = classify(fetched.events, now_utc, now);

        if let Some(notifier) = &self.notifier {
            let current = ids.iter().map(String::as_str);
            if let Err(e) = notifier.run(&classification.today, current, now_utc) {
                warn!(error = %e, "notification pass failed");
            }
        }

        let tz = now.timezone();
        Outcome::Rendered(self.formatter.build_menu(&classification, now_utc, &tz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use calbar_core::{Attendee, Event, EventDateTime, MenuRenderer, SwiftBarRenderer};
    use calbar_notify::{Ledger, MemoryLedgerStore, RecordingDispatcher, Scheduler};
    use calbar_providers::{AccessToken, BoxFuture, FetchResult, ProviderErrorCode, ProviderResult};
    use chrono::FixedOffset;

    enum Login {
        Valid,
        Missing,
        Fails(ProviderErrorCode),
    }

    struct FakeCredentials(Login);

    impl CredentialProvider for FakeCredentials {
        fn get_credentials(&self) -> BoxFuture<'_, ProviderResult<Option<AccessToken>>> {
            let result = match &self.0 {
                Login::Valid => Ok(Some(AccessToken::new("ya29.test"))),
                Login::Missing => Ok(None),
                Login::Fails(code) => Err(ProviderError::new(*code, "refresh failed")),
            };
            Box::pin(async move { result })
        }

        fn login(&self) -> BoxFuture<'_, ProviderResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    type Requests = Arc<Mutex<Vec<ListEventsRequest>>>;

    struct FakeCalendar {
        events: Result<Vec<Event>, ProviderErrorCode>,
        requests: Requests,
    }

    impl CalendarProvider for FakeCalendar {
        fn name(&self) -> &str {
            "fake"
        }

        fn list_events(
            &self,
            _token: &AccessToken,
            request: ListEventsRequest,
        ) -> BoxFuture<'_, ProviderResult<FetchResult>> {
            self.requests.lock().unwrap().push(request);
            let result = match &self.events {
                Ok(events) => Ok(FetchResult::new(events.clone())),
                Err(code) => Err(ProviderError::new(*code, "HTTP 500: backend error")),
            };
            Box::pin(async move { result })
        }
    }

    type TestPlugin = Plugin<MemoryLedgerStore, RecordingDispatcher>;

    fn setup(
        login: Login,
        events: Result<Vec<Event>, ProviderErrorCode>,
    ) -> (TestPlugin, Requests) {
        let requests = Requests::default();
        let calendar = FakeCalendar {
            events,
            requests: Arc::clone(&requests),
        };
        let plugin = Plugin::new(
            Box::new(FakeCredentials(login)),
            Box::new(calendar),
            "primary",
        );
        (plugin, requests)
    }

    fn with_notifier(plugin: TestPlugin, ledger: Ledger) -> TestPlugin {
        plugin.with_notifier(Notifier::new(
            Scheduler::default(),
            MemoryLedgerStore::new(ledger),
            RecordingDispatcher::new(),
        ))
    }

    fn render(outcome: Outcome) -> String {
        SwiftBarRenderer::new("/usr/local/bin/calbar")
            .render(&outcome.into_menu())
            .trim_end()
            .to_string()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn standup() -> Event {
        Event::new(
            "standup",
            EventDateTime::date_time("2024-01-01T09:00:00Z"),
            EventDateTime::date_time("2024-01-01T09:30:00Z"),
        )
        .with_summary("Standup")
        .with_attendee(Attendee::myself())
        .with_attendee(Attendee::other("ana@example.com"))
        .with_hangout_link("https://meet.google.com/abc-defg-hij")
    }

    fn planning() -> Event {
        Event::new(
            "planning",
            EventDateTime::date_time("2024-01-02T15:00:00Z"),
            EventDateTime::date_time("2024-01-02T16:00:00Z"),
        )
        .with_summary("Planning")
        .with_attendee(Attendee::other("bo@example.com"))
    }

    #[tokio::test]
    async fn missing_login_asks_to_log_in() {
        let (plugin, calendar) = setup(Login::Missing, Ok(vec![standup()]));
        let outcome = plugin.run(&at(8, 55)).await;
        assert!(matches!(outcome, Outcome::AuthRequired));
        assert!(calendar.lock().unwrap().is_empty());

        insta::assert_snapshot!(render(outcome), @r"
        🔑❌
        ---
        Login to Google Calendar | bash=/usr/local/bin/calbar param0=login terminal=true refresh=true
        ");
    }

    #[tokio::test]
    async fn rejected_token_asks_to_log_in() {
        let (plugin, _) = setup(Login::Valid, Err(ProviderErrorCode::AuthenticationFailed));
        assert!(matches!(plugin.run(&at(8, 55)).await, Outcome::AuthRequired));

        let (plugin, _) = setup(
            Login::Fails(ProviderErrorCode::AuthenticationFailed),
            Ok(vec![]),
        );
        assert!(matches!(plugin.run(&at(8, 55)).await, Outcome::AuthRequired));
    }

    #[tokio::test]
    async fn server_error_shows_error_menu() {
        let (plugin, _) = setup(Login::Valid, Err(ProviderErrorCode::ServerError));
        let outcome = plugin.run(&at(8, 55)).await;
        assert!(matches!(outcome, Outcome::FetchFailed(_)));

        insta::assert_snapshot!(render(outcome), @r"
        📅 ⚠️
        ---
        Error: HTTP 500: backend error
        Re-login | bash=/usr/local/bin/calbar param0=login terminal=true refresh=true
        ");
    }

    #[tokio::test]
    async fn refresh_network_failure_is_a_fetch_error() {
        let (plugin, calendar) = setup(
            Login::Fails(ProviderErrorCode::NetworkError),
            Ok(vec![standup()]),
        );
        assert!(matches!(plugin.run(&at(8, 55)).await, Outcome::FetchFailed(_)));
        assert!(calendar.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn renders_today_and_tomorrow() {
        let (plugin, _) = setup(Login::Valid, Ok(vec![standup(), planning()]));
        let outcome = plugin.run(&at(8, 55)).await;

        insta::assert_snapshot!(render(outcome), @r"
        📅 In 5 minutes • No more
        ---
        Today
        9:00 AM - 9:30 AM (30m) • Standup • 1 attendee | href=https://meet.google.com/abc-defg-hij
        ---
        Tomorrow
        3:00 PM - 4:00 PM (1h) • Planning • 1 attendee
        ---
        Refresh | refresh=true
        ");
    }

    #[tokio::test]
    async fn requests_local_two_day_window() {
        let (plugin, calendar) = setup(Login::Valid, Ok(vec![]));
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = at(8, 55).with_timezone(&tz);
        plugin.run(&now).await;

        let requests = calendar.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].calendar_id, "primary");
        assert!(requests[0].expand_recurring);
        let (start, end) = requests[0].window.to_rfc3339();
        assert_eq!(start, "2024-01-01T05:00:00Z");
        assert_eq!(end, "2024-01-03T05:00:00Z");
    }

    #[tokio::test]
    async fn notifies_once_and_prunes_stale_ids() {
        let (plugin, _) = setup(Login::Valid, Ok(vec![standup(), planning()]));
        let plugin = with_notifier(plugin, ["last-week"].into_iter().collect());

        plugin.run(&at(8, 55)).await;
        plugin.run(&at(8, 56)).await;

        let notifier = plugin.notifier().unwrap();
        let sent = notifier.dispatcher().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subtitle, "Standup");
        assert_eq!(
            sent[0].link.as_deref(),
            Some("https://meet.google.com/abc-defg-hij")
        );
        assert_eq!(
            notifier.store().snapshot().iter().collect::<Vec<_>>(),
            vec!["standup"]
        );
    }

    #[tokio::test]
    async fn tomorrow_is_never_notified() {
        let just_after_midnight = Event::new(
            "late",
            EventDateTime::date_time("2024-01-02T00:03:00Z"),
            EventDateTime::date_time("2024-01-02T00:30:00Z"),
        )
        .with_attendee(Attendee::other("bo@example.com"));
        let (plugin, _) = setup(Login::Valid, Ok(vec![just_after_midnight]));
        let plugin = with_notifier(plugin, Ledger::new());

        plugin.run(&at(23, 58)).await;
        assert!(plugin.notifier().unwrap().dispatcher().sent().is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_ledger_untouched() {
        let (plugin, _) = setup(Login::Valid, Err(ProviderErrorCode::Timeout));
        let plugin = with_notifier(plugin, ["standup"].into_iter().collect());

        plugin.run(&at(8, 55)).await;
        let ledger = plugin.notifier().unwrap().store().snapshot();
        assert!(ledger.contains("standup"));
    }

    #[tokio::test]
    async fn notification_failure_still_renders() {
        let (plugin, _) = setup(Login::Valid, Ok(vec![standup()]));
        let plugin = plugin.with_notifier(Notifier::new(
            Scheduler::default(),
            MemoryLedgerStore::default(),
            RecordingDispatcher::failing(),
        ));

        assert!(matches!(plugin.run(&at(8, 55)).await, Outcome::Rendered(_)));
    }
}
