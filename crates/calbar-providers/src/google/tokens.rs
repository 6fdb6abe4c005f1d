//! Persisted OAuth tokens.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};

/// Tokens are treated as expired this long before their real expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

/// A stored OAuth token set.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Already shortened by the refresh skew.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub last_refresh: DateTime<Utc>,
}

impl std::fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenInfo")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("last_refresh", &self.last_refresh)
            .finish_non_exhaustive()
    }
}

fn expiry(now: DateTime<Utc>, expires_in_secs: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in_secs.map(|secs| now + Duration::seconds(secs) - Duration::seconds(EXPIRY_SKEW_SECS))
}

impl TokenInfo {
    /// Builds a token set from a token endpoint response received at `now`.
    pub fn issued_at(
        now: DateTime<Utc>,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expiry(now, expires_in_secs),
            scopes,
            last_refresh: now,
        }
    }

    /// A token without a known expiry never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Replaces the access token after a refresh.
    ///
    /// Google usually omits the refresh token on refresh; the old one is
    /// kept unless a new one is issued.
    pub fn refreshed(
        mut self,
        now: DateTime<Utc>,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        self.access_token = access_token.into();
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.expires_at = expiry(now, expires_in_secs);
        self.last_refresh = now;
        self
    }
}

/// Token file on disk.
#[derive(Debug, Clone)]
pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored tokens.
    ///
    /// A missing or unreadable file yields `None`: either way the user has
    /// to log in again.
    pub fn load(&self) -> Option<TokenInfo> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no token file");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read token file");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unparsable token file");
                None
            }
        }
    }

    /// Writes tokens atomically, readable only by the owner on Unix.
    pub fn save(&self, tokens: &TokenInfo) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::internal(format!(
                    "failed to create token directory {}",
                    parent.display()
                ))
                .with_source(e)
            })?;
        }

        let content = serde_json::to_vec_pretty(tokens)
            .map_err(|e| ProviderError::internal("failed to serialize tokens").with_source(e))?;

        let temp_path = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let mut file = open_private(&temp_path)?;
            file.write_all(&content)?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            let message = format!("failed to write token file {}", self.path.display());
            ProviderError::internal(message).with_source(e)
        })?;

        debug!(path = %self.path.display(), "saved tokens");
        Ok(())
    }

    pub fn clear(&self) -> ProviderResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProviderError::internal("failed to remove token file").with_source(e)),
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}
