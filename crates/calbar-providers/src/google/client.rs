//! Google Calendar API v3 client.

use std::time::Duration;

use calbar_core::Event;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{AccessToken, FetchResult, ListEventsRequest};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Upper bound on followed `nextPageToken`s for one listing.
const MAX_PAGES: usize = 20;

/// Low-level HTTP client for `events.list`.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
}

impl GoogleCalendarClient {
    pub fn new(timeout: Duration, user_agent: &str) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;
        Ok(Self { http_client })
    }

    /// Lists every event in the request window, following pagination.
    pub async fn list_events(
        &self,
        token: &AccessToken,
        request: &ListEventsRequest,
    ) -> ProviderResult<FetchResult> {
        let mut result = FetchResult::default();
        let mut page_token: Option<String> = None;

        for page in 1..=MAX_PAGES {
            let response = self.list_page(token, request, page_token.as_deref()).await?;
            let (events, skipped) = decode_items(response.items);
            result.events.extend(events);
            result.skipped += skipped;

            match response.next_page_token {
                Some(next) => page_token = Some(next),
                None => {
                    debug!(
                        calendar = %request.calendar_id,
                        pages = page,
                        events = result.events.len(),
                        skipped = result.skipped,
                        "listed events"
                    );
                    return Ok(result);
                }
            }
        }

        warn!(
            calendar = %request.calendar_id,
            max_pages = MAX_PAGES,
            "stopped following event pages"
        );
        Ok(result)
    }

    async fn list_page(
        &self,
        token: &AccessToken,
        request: &ListEventsRequest,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let url = format!(
            "{CALENDAR_API_BASE}/calendars/{}/events",
            urlencoding::encode(&request.calendar_id)
        );
        let (time_min, time_max) = request.window.to_rfc3339();

        let mut query = vec![
            ("timeMin", time_min),
            ("timeMax", time_max),
            ("singleEvents", request.expand_recurring.to_string()),
        ];
        // The API only accepts orderBy=startTime on expanded listings.
        if request.order_by_start_time && request.expand_recurring {
            query.push(("orderBy", "startTime".to_string()));
        }
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token.to_string()));
        }

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token.secret())
            .query(&query)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport("events request", e))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport("events response", e))?;

        if !status.is_success() {
            return Err(status_error(status, &body, retry_after, &request.calendar_id));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response("failed to parse events response").with_source(e)
        })
    }
}

/// Maps a non-success API status to a provider error.
fn status_error(
    status: StatusCode,
    body: &str,
    retry_after: Option<u64>,
    calendar_id: &str,
) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED => {
            ProviderError::authentication("access token expired or revoked")
        }
        StatusCode::FORBIDDEN => {
            ProviderError::authorization(format!("access denied to calendar '{calendar_id}'"))
        }
        StatusCode::NOT_FOUND => {
            ProviderError::not_found(format!("calendar '{calendar_id}' not found"))
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(match retry_after {
            Some(secs) => format!("rate limit exceeded, retry after {secs} seconds"),
            None => "rate limit exceeded".to_string(),
        }),
        _ => {
            let detail = serde_json::from_str::<ApiErrorResponse>(body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| status.to_string());
            ProviderError::server(format!("API error ({}): {detail}", status.as_u16()))
        }
    }
}

/// Decodes raw items one by one so a single bad event does not fail the page.
fn decode_items(items: Vec<serde_json::Value>) -> (Vec<Event>, usize) {
    let mut events = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for item in items {
        if item.get("status").and_then(|s| s.as_str()) == Some("cancelled") {
            continue;
        }
        let id = item
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("<missing id>")
            .to_string();
        match serde_json::from_value::<Event>(item) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!(event_id = %id, error = %e, "skipping undecodable event");
                skipped += 1;
            }
        }
    }

    (events, skipped)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
