//! Credential and calendar providers.
//!
//! - [`CredentialProvider`] yields an access token or reports that a login
//!   is required
//! - [`CalendarProvider`] lists the events in a time window
//! - [`ProviderError`] classifies failures for the caller
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐       ┌────────────────────┐
//! │ GoogleCredentials  │       │  GoogleCalendar    │
//! │ token.json + OAuth │       │  events.list       │
//! └─────────┬──────────┘       └─────────┬──────────┘
//!           │ CredentialProvider         │ CalendarProvider
//!           ▼                            ▼
//!     Option<AccessToken> ───────▶  FetchResult { Vec<Event> }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use calbar_providers::{
//!     CalendarProvider, CredentialProvider, ListEventsRequest, ProviderResult,
//! };
//!
//! async fn fetch(
//!     creds: &dyn CredentialProvider,
//!     calendar: &dyn CalendarProvider,
//!     window: TimeWindow,
//! ) -> ProviderResult<()> {
//!     if let Some(token) = creds.get_credentials().await? {
//!         let request = ListEventsRequest::new("primary", window);
//!         let result = calendar.list_events(&token, request).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod provider;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{
    AccessToken, BoxFuture, CalendarProvider, CredentialProvider, FetchResult, ListEventsRequest,
};
