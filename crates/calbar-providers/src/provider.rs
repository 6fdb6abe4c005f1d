//! Traits for obtaining credentials and fetching calendar events.
//!
//! The client only talks to these two traits, so a run can be driven by
//! in-memory fakes in tests and by the Google implementations in production.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use calbar_core::{Event, TimeWindow};

use crate::error::ProviderResult;

/// A boxed future for async trait methods.
///
/// Keeps both traits object-safe so callers can hold `&dyn CalendarProvider`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A bearer token accepted by the calendar API.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Parameters for one events listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEventsRequest {
    pub calendar_id: String,
    /// Only events overlapping this window are returned.
    pub window: TimeWindow,
    /// Expand recurring events into single instances.
    pub expand_recurring: bool,
    pub order_by_start_time: bool,
}

impl ListEventsRequest {
    pub fn new(calendar_id: impl Into<String>, window: TimeWindow) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            window,
            expand_recurring: true,
            order_by_start_time: true,
        }
    }

    #[must_use]
    pub fn with_expand_recurring(mut self, expand: bool) -> Self {
        self.expand_recurring = expand;
        self
    }

    #[must_use]
    pub fn with_order_by_start_time(mut self, ordered: bool) -> Self {
        self.order_by_start_time = ordered;
        self
    }
}

/// Events returned by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    /// Events in provider order (start time when requested).
    pub events: Vec<Event>,
    /// Items the provider returned but that could not be decoded.
    pub skipped: usize,
}

impl FetchResult {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events, skipped: 0 }
    }
}

/// Supplies an access token, or reports that the user must log in.
pub trait CredentialProvider: Send + Sync {
    /// Returns a usable token, refreshing a stored one when it has expired.
    ///
    /// `Ok(None)` means no usable login exists: nothing stored, no refresh
    /// token, or the refresh was rejected.
    fn get_credentials(&self) -> BoxFuture<'_, ProviderResult<Option<AccessToken>>>;

    /// Runs the interactive login and persists the resulting token.
    fn login(&self) -> BoxFuture<'_, ProviderResult<()>>;
}

/// Lists events from a calendar service.
///
/// # Example Implementation
///
/// ```ignore
/// struct FixedCalendar(Vec<Event>);
///
/// impl CalendarProvider for FixedCalendar {
///     fn name(&self) -> &str {
///         "fixed"
///     }
///
///     fn list_events(
///         &self,
///         _token: &AccessToken,
///         _request: ListEventsRequest,
///     ) -> BoxFuture<'_, ProviderResult<FetchResult>> {
///         let events = self.0.clone();
///         Box::pin(async move { Ok(FetchResult::new(events)) })
///     }
/// }
/// ```
pub trait CalendarProvider: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    fn list_events(
        &self,
        token: &AccessToken,
        request: ListEventsRequest,
    ) -> BoxFuture<'_, ProviderResult<FetchResult>>;
}
