//! Google Calendar backend.
//!
//! Login uses the OAuth 2.0 authorization code flow with PKCE and a loopback
//! redirect. The resulting tokens live in `token.json` next to the user's
//! `credentials.json` and are refreshed transparently when they expire.
//!
//! # Example
//!
//! ```ignore
//! use calbar_providers::google::{GoogleCalendar, GoogleConfig, GoogleCredentials};
//!
//! let config = GoogleConfig::new(data_dir);
//! let credentials = GoogleCredentials::new(config.clone())?;
//! let calendar = GoogleCalendar::new(&config)?;
//!
//! match credentials.get_credentials().await? {
//!     Some(token) => { /* calendar.list_events(&token, request).await? */ }
//!     None => { /* show the login menu */ }
//! }
//! ```

mod client;
mod config;
mod oauth;
mod provider;
mod tokens;

pub use client::GoogleCalendarClient;
pub use config::{CREDENTIALS_FILE_NAME, GoogleConfig, OAuthCredentials, TOKEN_FILE_NAME};
pub use oauth::{OAuthClient, PkceFlow};
pub use provider::{GoogleCalendar, GoogleCredentials};
pub use tokens::{TokenInfo, TokenStorage};
