//! Google Calendar provider configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// Name of the OAuth client file downloaded from the Google Cloud Console.
pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Name of the persisted token file.
pub const TOKEN_FILE_NAME: &str = "token.json";

/// OAuth 2.0 client identity for a desktop application.
///
/// Google requires every installation to bring its own registered client.
#[derive(Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Accepted layouts of the credentials JSON file.
///
/// The console exports `{"installed": {...}}` for desktop clients and
/// `{"web": {...}}` for web clients; gcloud writes the fields at the root.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads the client identity from a credentials JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read credentials file {}",
                path.display()
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: CredentialsFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration("failed to parse credentials JSON").with_source(e)
        })?;

        let credentials = if let Some(section) = file.installed.or(file.web) {
            Self::new(section.client_id, section.client_secret)
        } else if let (Some(id), Some(secret)) = (file.client_id, file.client_secret) {
            Self::new(id, secret)
        } else {
            return Err(ProviderError::configuration(
                "credentials file must contain an 'installed' or 'web' section, \
                 or 'client_id' and 'client_secret' at the root",
            ));
        };

        credentials.validate()?;
        Ok(credentials)
    }

    pub fn validate(&self) -> ProviderResult<()> {
        if self.client_id.is_empty() {
            return Err(ProviderError::configuration("client_id is required"));
        }
        if self.client_secret.is_empty() {
            return Err(ProviderError::configuration("client_secret is required"));
        }
        Ok(())
    }
}

/// Where the Google provider keeps its files and how it talks to the API.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth client file; read at login and on every token refresh.
    pub credentials_path: PathBuf,
    /// Persisted access and refresh token.
    pub token_path: PathBuf,
    /// Calendar to list; `"primary"` is the account's main calendar.
    pub calendar_id: String,
    /// Per-request timeout for API and token endpoint calls.
    pub timeout: Duration,
    /// Ports tried, in order, for the login redirect listener.
    pub loopback_port_range: (u16, u16),
    pub scopes: Vec<String>,
    pub user_agent: String,
    /// OAuth token endpoint used for code exchange and refresh.
    pub token_url: String,
}

impl GoogleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Read-only calendar access.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.readonly";

    pub const DEFAULT_TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Uses `credentials.json` and `token.json` inside `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            credentials_path: data_dir.join(CREDENTIALS_FILE_NAME),
            token_path: data_dir.join(TOKEN_FILE_NAME),
            calendar_id: "primary".to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            loopback_port_range: (8080, 8090),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            user_agent: format!("calbar/{}", env!("CARGO_PKG_VERSION")),
            token_url: Self::DEFAULT_TOKEN_URL.to_string(),
        }
    }

    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_loopback_port_range(mut self, start: u16, end: u16) -> Self {
        self.loopback_port_range = (start, end);
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// True when the OAuth client file is present.
    pub fn has_credentials_file(&self) -> bool {
        self.credentials_path.is_file()
    }

    pub fn validate(&self) -> ProviderResult<()> {
        if self.calendar_id.trim().is_empty() {
            return Err(ProviderError::configuration("calendar_id must not be empty"));
        }
        if self.scopes.is_empty() {
            return Err(ProviderError::configuration("at least one OAuth scope is required"));
        }
        if self.loopback_port_range.0 > self.loopback_port_range.1 {
            return Err(ProviderError::configuration(format!(
                "invalid loopback port range {}-{}",
                self.loopback_port_range.0, self.loopback_port_range.1
            )));
        }
        if self.timeout.is_zero() {
            return Err(ProviderError::configuration("timeout must be positive"));
        }
        Ok(())
    }
}
