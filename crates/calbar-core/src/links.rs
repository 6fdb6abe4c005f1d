//! Conference link extraction.
//!
//! A joinable URL is picked from an [`Event`] in priority order, first match wins:
//! 1. the `hangoutLink` field, verbatim
//! 2. the first `conferenceData` entry point of type `video`
//! 3. a free-text scan of `description`, then `location`, for a known
//!    conferencing domain
//!
//! The free-text scan is driven by [`LinkPatterns`], a table of
//! domain → detection regex that can be extended from configuration.
//!
//! # Example
//!
//! ```
//! use calbar_core::event::{Event, EventDateTime};
//! use calbar_core::links::LinkExtractor;
//!
//! let event = Event::new(
//!     "e1",
//!     EventDateTime::date_time("2024-01-01T09:00:00Z"),
//!     EventDateTime::date_time("2024-01-01T09:30:00Z"),
//! )
//! .with_description("Join: https://acme.zoom.us/j/123456789?pwd=abc");
//!
//! let link = LinkExtractor::default().extract(&event);
//! assert_eq!(link.as_deref(), Some("https://acme.zoom.us/j/123456789?pwd=abc"));
//! ```

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::trace;
use url::Url;

use crate::event::Event;

/// Domains scanned in free text when no custom table is configured.
pub const DEFAULT_DOMAINS: [&str; 4] = [
    "zoom.us",
    "meet.google.com",
    "teams.microsoft.com",
    "webex.com",
];

/// Regex for detecting Microsoft Outlook SafeLinks.
///
/// The original URL is percent-encoded in the `url` query parameter.
static SAFELINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^/]*safelinks\.protection\.outlook\.com/?\?[^?]*url=([^&]+)")
        .expect("Invalid SafeLink regex")
});

/// Error building a link pattern from configuration.
#[derive(Debug, Error)]
#[error("invalid link pattern for '{domain}': {source}")]
pub struct LinkPatternError {
    pub domain: String,
    #[source]
    pub source: regex::Error,
}

/// One entry of the detection table.
#[derive(Debug, Clone)]
pub struct LinkPattern {
    domain: String,
    regex: Regex,
}

impl LinkPattern {
    /// Builds the standard pattern for a domain: a URL containing the domain,
    /// running up to the first whitespace, angle bracket or double quote.
    pub fn for_domain(domain: impl Into<String>) -> Self {
        let domain = domain.into();
        let pattern = format!(r#"https?://[^\s<>"]*{}[^\s<>"]*"#, regex::escape(&domain));
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .expect("escaped domain pattern is valid");
        Self { domain, regex }
    }

    /// Builds an entry with a custom detection regex (matched case-insensitively).
    pub fn with_regex(domain: impl Into<String>, pattern: &str) -> Result<Self, LinkPatternError> {
        let domain = domain.into();
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => Ok(Self { domain, regex }),
            Err(source) => Err(LinkPatternError { domain, source }),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the first match in `text`, if the text mentions the domain.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        if !text.to_lowercase().contains(&self.domain.to_lowercase()) {
            return None;
        }
        self.regex.find(text).map(|m| m.as_str())
    }
}

/// Ordered domain → pattern table for free-text detection.
#[derive(Debug, Clone)]
pub struct LinkPatterns {
    patterns: Vec<LinkPattern>,
}

impl Default for LinkPatterns {
    fn default() -> Self {
        Self::from_domains(DEFAULT_DOMAINS)
    }
}

impl LinkPatterns {
    /// Builds a table with the standard pattern for each domain, in order.
    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: domains.into_iter().map(LinkPattern::for_domain).collect(),
        }
    }

    /// Replaces the pattern for an existing domain, or appends a new entry.
    pub fn set(&mut self, pattern: LinkPattern) {
        let existing = self
            .patterns
            .iter_mut()
            .find(|p| p.domain == pattern.domain);
        match existing {
            Some(existing) => *existing = pattern,
            None => self.patterns.push(pattern),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkPattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Scans `text` domain by domain; the first domain with a match wins.
    pub fn find_in<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.patterns.iter().find_map(|p| p.find(text))
    }
}

/// Extracts a joinable conference URL from an event.
#[derive(Debug, Clone, Default)]
pub struct LinkExtractor {
    patterns: LinkPatterns,
    unwrap_safelinks: bool,
}

impl LinkExtractor {
    pub fn new(patterns: LinkPatterns) -> Self {
        Self {
            patterns,
            unwrap_safelinks: false,
        }
    }

    /// Unwraps Outlook SafeLinks found by the free-text scan.
    pub fn with_safelink_unwrapping(mut self, enabled: bool) -> Self {
        self.unwrap_safelinks = enabled;
        self
    }

    pub fn patterns(&self) -> &LinkPatterns {
        &self.patterns
    }

    /// Returns the event's conference URL, or `None` when nothing matches.
    ///
    /// No network validation is performed.
    pub fn extract(&self, event: &Event) -> Option<String> {
        if let Some(link) = &event.hangout_link {
            trace!(event_id = %event.id, "using hangout link");
            return Some(link.clone());
        }

        if let Some(data) = &event.conference_data {
            if let Some(uri) = data
                .entry_points
                .iter()
                .find(|entry| entry.is_video())
                .and_then(|entry| entry.uri.clone())
            {
                trace!(event_id = %event.id, "using video entry point");
                return Some(uri);
            }
        }

        [event.description.as_deref(), event.location.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|text| self.patterns.find_in(text))
            .map(|found| {
                if self.unwrap_safelinks {
                    unwrap_safelink(found)
                } else {
                    found.to_string()
                }
            })
    }
}

/// Unwraps a Microsoft Outlook SafeLink to the URL it protects.
///
/// Anything that is not a SafeLink, or whose target is not an http(s) URL,
/// is returned unchanged.
pub fn unwrap_safelink(url: &str) -> String {
    SAFELINK_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|encoded| urlencoding::decode(encoded.as_str()).ok())
        .filter(|decoded| {
            Url::parse(decoded)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false)
        })
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|| url.to_string())
}
