//! Google implementations of [`CredentialProvider`] and [`CalendarProvider`].

use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{
    AccessToken, BoxFuture, CalendarProvider, CredentialProvider, FetchResult, ListEventsRequest,
};

use super::client::GoogleCalendarClient;
use super::config::{GoogleConfig, OAuthCredentials};
use super::oauth::OAuthClient;
use super::tokens::{TokenInfo, TokenStorage};

const PROVIDER_NAME: &str = "google";

/// Loads, refreshes and stores the user's Google tokens.
#[derive(Debug)]
pub struct GoogleCredentials {
    config: GoogleConfig,
    storage: TokenStorage,
}

impl GoogleCredentials {
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|e| e.with_provider(PROVIDER_NAME))?;
        let storage = TokenStorage::new(&config.token_path);
        Ok(Self { config, storage })
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    fn oauth_client(&self) -> ProviderResult<OAuthClient> {
        let credentials = OAuthCredentials::from_file(&self.config.credentials_path)?;
        let client = OAuthClient::new(credentials, self.config.timeout)?;
        Ok(client.with_token_url(&self.config.token_url))
    }

    async fn load_or_refresh(&self) -> ProviderResult<Option<AccessToken>> {
        let Some(tokens) = self.storage.load() else {
            return Ok(None);
        };

        if !tokens.has_scopes(&self.config.scopes) {
            info!("stored token lacks required scopes, login required");
            return Ok(None);
        }
        if !tokens.is_expired() {
            return Ok(Some(AccessToken::new(tokens.access_token)));
        }
        if tokens.refresh_token.is_none() {
            debug!("token expired and no refresh token stored");
            return Ok(None);
        }

        let oauth = match self.oauth_client() {
            Ok(oauth) => oauth,
            Err(e) => {
                warn!(error = %e, "cannot refresh token without app credentials");
                return Ok(None);
            }
        };

        match oauth.refresh(tokens).await {
            Ok(refreshed) => {
                info!("refreshed access token");
                if let Err(e) = self.storage.save(&refreshed) {
                    warn!(error = %e, "failed to store refreshed token");
                }
                Ok(Some(AccessToken::new(refreshed.access_token)))
            }
            Err(e) if e.is_auth_error() => {
                warn!(error = %e, "token refresh rejected, login required");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn authorize(&self) -> ProviderResult<TokenInfo> {
        let oauth = self.oauth_client()?;
        oauth
            .authorize(&self.config.scopes, self.config.loopback_port_range)
            .await
    }
}

impl CredentialProvider for GoogleCredentials {
    fn get_credentials(&self) -> BoxFuture<'_, ProviderResult<Option<AccessToken>>> {
        Box::pin(async move {
            self.load_or_refresh()
                .await
                .map_err(|e| e.with_provider(PROVIDER_NAME))
        })
    }

    fn login(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(async move {
            let tokens = self
                .authorize()
                .await
                .map_err(|e| e.with_provider(PROVIDER_NAME))?;
            self.storage.save(&tokens)?;
            info!(path = %self.storage.path().display(), "stored new token");
            Ok(())
        })
    }
}

/// Google Calendar as a [`CalendarProvider`].
#[derive(Debug, Clone)]
pub struct GoogleCalendar {
    client: GoogleCalendarClient,
}

impl GoogleCalendar {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let client = GoogleCalendarClient::new(config.timeout, &config.user_agent)?;
        Ok(Self { client })
    }
}

impl CalendarProvider for GoogleCalendar {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn list_events(
        &self,
        token: &AccessToken,
        request: ListEventsRequest,
    ) -> BoxFuture<'_, ProviderResult<FetchResult>> {
        let token = token.clone();
        Box::pin(async move {
            self.client
                .list_events(&token, &request)
                .await
                .map_err(|e: ProviderError| e.with_provider(PROVIDER_NAME))
        })
    }
}
