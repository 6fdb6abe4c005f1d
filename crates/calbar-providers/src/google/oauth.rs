//! OAuth 2.0 authorization code flow with PKCE for desktop logins.
//!
//! The flow binds a listener on a loopback port, sends the browser to
//! Google's consent page with a S256 challenge, waits for the redirect that
//! carries the authorization code, then exchanges code and verifier for an
//! access token and a refresh token.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult};

use super::config::{GoogleConfig, OAuthCredentials};
use super::tokens::TokenInfo;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Random bytes in the code verifier, before base64url encoding.
const CODE_VERIFIER_LENGTH: usize = 32;
const STATE_LENGTH: usize = 16;

/// How long the user has to finish the consent screen.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const CALLBACK_PATH: &str = "/callback";

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n\
    <html><body><h1>Calendar access granted</h1>\
    <p>You can close this window and return to the terminal.</p></body></html>";
const FAILURE_PAGE: &str = "HTTP/1.1 400 Bad Request\r\n\
    Content-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n\
    <html><body><h1>Authorization failed</h1>\
    <p>You can close this window.</p></body></html>";
const NOT_FOUND_PAGE: &str =
    "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Talks to Google's authorization and token endpoints.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
    token_url: String,
}

impl OAuthClient {
    pub fn new(credentials: OAuthCredentials, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            credentials,
            http_client,
            token_url: GoogleConfig::DEFAULT_TOKEN_URL.to_string(),
        })
    }

    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Runs the interactive browser login and returns fresh tokens.
    pub async fn authorize(
        &self,
        scopes: &[String],
        port_range: (u16, u16),
    ) -> ProviderResult<TokenInfo> {
        let pkce = PkceFlow::new();
        let server = CallbackServer::bind(port_range).await?;
        let redirect_uri = server.redirect_uri();
        let auth_url = pkce.build_auth_url(&self.credentials.client_id, &redirect_uri, scopes)?;

        info!(port = server.port, "waiting for browser authorization");
        debug!(url = %auth_url, "authorization URL");
        if let Err(e) = open::that(auth_url.as_str()) {
            warn!(error = %e, "failed to open browser");
            eprintln!("\nOpen this URL in your browser to continue:\n\n{auth_url}\n");
        }

        let code = server.wait_for_code(&pkce.state).await?;
        debug!("received authorization code");

        let response = self
            .request_token(
                &[
                    ("code", code.as_str()),
                    ("code_verifier", pkce.verifier.as_str()),
                    ("grant_type", "authorization_code"),
                    ("redirect_uri", redirect_uri.as_str()),
                ],
                "token exchange",
            )
            .await?;

        Ok(TokenInfo::issued_at(
            Utc::now(),
            response.access_token,
            response.refresh_token,
            response.expires_in,
            scopes.to_vec(),
        ))
    }

    /// Trades the stored refresh token for a new access token.
    ///
    /// A rejected refresh token surfaces as an authentication error.
    pub async fn refresh(&self, tokens: TokenInfo) -> ProviderResult<TokenInfo> {
        let refresh_token = tokens
            .refresh_token
            .clone()
            .ok_or_else(|| ProviderError::authentication("no refresh token stored"))?;

        let response = self
            .request_token(
                &[
                    ("refresh_token", refresh_token.as_str()),
                    ("grant_type", "refresh_token"),
                ],
                "token refresh",
            )
            .await?;

        debug!("refreshed access token");
        Ok(tokens.refreshed(
            Utc::now(),
            response.access_token,
            response.refresh_token,
            response.expires_in,
        ))
    }

    async fn request_token(
        &self,
        grant: &[(&str, &str)],
        context: &str,
    ) -> ProviderResult<TokenResponse> {
        let mut params = vec![
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];
        params.extend_from_slice(grant);

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(context, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(context, e))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                ProviderError::invalid_response(format!("{context}: invalid token response"))
                    .with_source(e)
            });
        }

        let detail = serde_json::from_str::<TokenErrorResponse>(&body)
            .map(|e| e.to_string())
            .unwrap_or_else(|_| status.to_string());
        if status.is_client_error() {
            Err(ProviderError::authentication(format!("{context} rejected: {detail}")))
        } else {
            Err(ProviderError::server(format!("{context} failed: {detail}")))
        }
    }
}

/// PKCE verifier, challenge and CSRF state for one login (RFC 7636).
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(STATE_LENGTH),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Consent page URL requesting offline access, so a refresh token is issued.
    pub fn build_auth_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> ProviderResult<Url> {
        let scope = scopes.join(" ");
        Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("code_challenge", self.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", self.state.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| ProviderError::internal("failed to build authorization URL").with_source(e))
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Loopback listener receiving the consent redirect.
struct CallbackServer {
    listener: TcpListener,
    port: u16,
}

impl CallbackServer {
    /// Binds the first free port in the inclusive range.
    async fn bind(port_range: (u16, u16)) -> ProviderResult<Self> {
        for port in port_range.0..=port_range.1 {
            match TcpListener::bind(("127.0.0.1", port)).await {
                Ok(listener) => {
                    debug!(port, "bound loopback listener");
                    return Ok(Self { listener, port });
                }
                Err(e) => debug!(port, error = %e, "port unavailable"),
            }
        }
        Err(ProviderError::configuration(format!(
            "no available port in range {}-{}",
            port_range.0, port_range.1
        )))
    }

    fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}{CALLBACK_PATH}", self.port)
    }

    async fn wait_for_code(self, expected_state: &str) -> ProviderResult<String> {
        tokio::time::timeout(CALLBACK_TIMEOUT, self.accept_until_callback(expected_state))
            .await
            .map_err(|_| ProviderError::timeout("no authorization received within 5 minutes"))?
    }

    async fn accept_until_callback(&self, expected_state: &str) -> ProviderResult<String> {
        loop {
            let (mut stream, _) = self.listener.accept().await.map_err(|e| {
                ProviderError::internal("failed to accept connection").with_source(e)
            })?;

            let mut request_line = String::new();
            let read = BufReader::new(&mut stream)
                .read_line(&mut request_line)
                .await;
            if let Err(e) = read {
                debug!(error = %e, "dropping unreadable connection");
                continue;
            }

            let outcome = parse_callback(&request_line, expected_state);
            let page = match &outcome {
                None => NOT_FOUND_PAGE,
                Some(Ok(_)) => SUCCESS_PAGE,
                Some(Err(_)) => FAILURE_PAGE,
            };
            let _ = stream.write_all(page.as_bytes()).await;
            let _ = stream.shutdown().await;

            if let Some(outcome) = outcome {
                return outcome;
            }
        }
    }
}

/// Interprets one HTTP request line received by the loopback listener.
///
/// `None` means the request is not the redirect (a favicon request, say) and
/// the listener should keep waiting.
fn parse_callback(request_line: &str, expected_state: &str) -> Option<ProviderResult<String>> {
    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return None;
    };
    let url = Url::parse("http://127.0.0.1").ok()?.join(target).ok()?;
    if url.path() != CALLBACK_PATH {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(ProviderError::authentication(format!("authorization denied: {error}"))));
    }
    if state.as_deref() != Some(expected_state) {
        return Some(Err(ProviderError::authentication("authorization state mismatch")));
    }
    let code = code.ok_or_else(|| ProviderError::authentication("no authorization code"));
    Some(code)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl std::fmt::Display for TokenErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{} ({description})", self.error),
            None => f.write_str(&self.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    mod pkce {
        use super::*;

        #[test]
        fn verifier_is_43_chars() {
            assert_eq!(PkceFlow::new().verifier.len(), 43);
        }

        #[test]
        fn challenge_matches_rfc7636_example() {
            let challenge =
                PkceFlow::compute_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
            assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
        }

        #[test]
        fn flows_are_random() {
            let a = PkceFlow::new();
            let b = PkceFlow::new();
            assert_ne!(a.verifier, b.verifier);
            assert_ne!(a.state, b.state);
        }

        #[test]
        fn auth_url_parameters() {
            let flow = PkceFlow::new();
            let url = flow.build_auth_url(
                "client.apps.googleusercontent.com",
                "http://127.0.0.1:8080/callback",
                &[GoogleConfig::DEFAULT_SCOPE.to_string()],
            )
            .unwrap();
            assert!(url.as_str().starts_with(GOOGLE_AUTH_URL));

            let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
            assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:8080/callback");
            assert_eq!(pairs["scope"], GoogleConfig::DEFAULT_SCOPE);
            assert_eq!(pairs["code_challenge"], flow.challenge);
            assert_eq!(pairs["code_challenge_method"], "S256");
            assert_eq!(pairs["state"], flow.state);
            assert_eq!(pairs["access_type"], "offline");
            assert_eq!(pairs["prompt"], "consent");
        }
    }

    mod callback {
        use super::*;

        #[test]
        fn extracts_code() {
            let line = "GET /callback?state=s1&code=4%2F0Ab&scope=x HTTP/1.1\r\n";
            assert_eq!(parse_callback(line, "s1").unwrap().unwrap(), "4/0Ab");
        }

        #[test]
        fn ignores_other_paths() {
            assert!(parse_callback("GET /favicon.ico HTTP/1.1", "s1").is_none());
            assert!(parse_callback("POST /callback?code=x HTTP/1.1", "s1").is_none());
            assert!(parse_callback("", "s1").is_none());
        }

        #[test]
        fn denied_consent() {
            let err = parse_callback("GET /callback?error=access_denied&state=s1 HTTP/1.1", "s1")
                .unwrap()
                .unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
            assert!(err.message().contains("access_denied"));
        }

        #[test]
        fn state_mismatch() {
            let err = parse_callback("GET /callback?code=x&state=other HTTP/1.1", "s1")
                .unwrap()
                .unwrap_err();
            assert!(err.message().contains("state"));
            let missing_state = parse_callback("GET /callback?code=x HTTP/1.1", "s1").unwrap();
            assert!(missing_state.is_err());
        }

        #[tokio::test]
        async fn server_skips_other_requests_and_returns_code() {
            use tokio::io::AsyncReadExt;
            use tokio::net::TcpStream;

            let server = CallbackServer::bind((0, 0)).await.unwrap();
            let addr = server.listener.local_addr().unwrap();
            let waiter = tokio::spawn(async move { server.wait_for_code("st").await });

            let mut favicon = TcpStream::connect(addr).await.unwrap();
            favicon
                .write_all(b"GET /favicon.ico HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
            let mut reply = String::new();
            favicon.read_to_string(&mut reply).await.unwrap();
            assert!(reply.starts_with("HTTP/1.1 404"));

            let mut redirect = TcpStream::connect(addr).await.unwrap();
            redirect
                .write_all(b"GET /callback?code=abc&state=st HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
            let mut reply = String::new();
            redirect.read_to_string(&mut reply).await.unwrap();
            assert!(reply.starts_with("HTTP/1.1 200"));

            assert_eq!(waiter.await.unwrap().unwrap(), "abc");
        }
    }

    #[test]
    fn token_error_display() {
        let err: TokenErrorResponse = serde_json::from_str(
            r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#,
        )
        .unwrap();
        assert_eq!(
            err.to_string(),
            "invalid_grant (Token has been expired or revoked.)"
        );
    }
}
