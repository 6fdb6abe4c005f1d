//! Client configuration.
//!
//! All settings live in a single `config.toml`, by default at
//! `~/.config/calbar/config.toml` (`~/Library/Application Support/calbar/`
//! on macOS). A missing file means defaults.
//!
//! ```toml
//! [google]
//! calendar_id = "primary"
//!
//! [notifications]
//! window_start_secs = 240
//! window_end_secs = 360
//!
//! [[links.patterns]]
//! domain = "whereby.com"
//! pattern = 'https://whereby\.com/[\w-]+'
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use calbar_core::{FormatOptions, LinkExtractor, LinkPattern, LinkPatterns, links::DEFAULT_DOMAINS};
use calbar_notify::{DesktopDispatcher, FileLedgerStore, Scheduler};
use calbar_providers::google::GoogleConfig;

use crate::error::{ClientError, ClientResult};

const APP_DIR: &str = "calbar";
const LEDGER_FILE_NAME: &str = "notified.json";

/// Configuration for the calbar plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub general: GeneralSettings,
    pub google: GoogleSettings,
    pub notifications: NotificationSettings,
    pub links: LinkSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Holds `credentials.json`, `token.json` and the notification ledger.
    pub data_dir: Option<PathBuf>,
}

/// Google Calendar settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub calendar_id: String,
    /// Defaults to `<data_dir>/credentials.json`.
    pub credentials_file: Option<PathBuf>,
    /// Defaults to `<data_dir>/token.json`.
    pub token_file: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Ports tried for the login redirect listener.
    pub loopback_port_range: (u16, u16),
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            calendar_id: "primary".to_string(),
            credentials_file: None,
            token_file: None,
            timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
            loopback_port_range: (8080, 8090),
        }
    }
}

/// Meeting-start notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    /// Defaults to `<data_dir>/notified.json`.
    pub ledger_file: Option<PathBuf>,
    /// Earliest trigger point, in seconds before start.
    pub window_start_secs: i64,
    /// Latest trigger point, in seconds before start.
    pub window_end_secs: i64,
    pub app_name: String,
    pub timeout_secs: u64,
    /// Hold an exclusive lock on the ledger during each pass.
    pub use_lock: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ledger_file: None,
            window_start_secs: *calbar_notify::DEFAULT_WINDOW_SECS.start(),
            window_end_secs: *calbar_notify::DEFAULT_WINDOW_SECS.end(),
            app_name: DesktopDispatcher::DEFAULT_APP_NAME.to_string(),
            timeout_secs: DesktopDispatcher::DEFAULT_TIMEOUT_SECS,
            use_lock: true,
        }
    }
}

/// Free-text conference link detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Domains scanned for in descriptions and locations, in order.
    pub domains: Vec<String>,
    /// Custom detection regexes, replacing the default for their domain.
    pub patterns: Vec<PatternSettings>,
    /// Replace Outlook SafeLinks with the URL they wrap.
    pub unwrap_safelinks: bool,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            domains: DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect(),
            patterns: Vec::new(),
            unwrap_safelinks: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSettings {
    pub domain: String,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub show_attendees: bool,
    /// Truncate titles longer than this, with an ellipsis.
    pub max_title_length: Option<usize>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_attendees: true,
            max_title_length: None,
        }
    }
}

impl ClientConfig {
    /// Loads the default file, or defaults if it does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads a specific file, which must exist.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ClientError::config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.general
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.notifications
            .ledger_file
            .clone()
            .unwrap_or_else(|| self.data_dir().join(LEDGER_FILE_NAME))
    }

    pub fn validate(&self) -> ClientResult<()> {
        let n = &self.notifications;
        if n.window_start_secs > n.window_end_secs {
            return Err(ClientError::config(format!(
                "notifications.window_start_secs ({}) is after window_end_secs ({})",
                n.window_start_secs, n.window_end_secs
            )));
        }
        self.google_config()?;
        self.link_extractor()?;
        Ok(())
    }

    pub fn google_config(&self) -> ClientResult<GoogleConfig> {
        let g = &self.google;
        let mut config = GoogleConfig::new(self.data_dir())
            .with_calendar_id(&g.calendar_id)
            .with_timeout(Duration::from_secs(g.timeout_secs))
            .with_loopback_port_range(g.loopback_port_range.0, g.loopback_port_range.1);
        if let Some(path) = &g.credentials_file {
            config = config.with_credentials_path(path);
        }
        if let Some(path) = &g.token_file {
            config = config.with_token_path(path);
        }
        config
            .validate()
            .map_err(|e| ClientError::config(format!("[google] {}", e.message())))?;
        Ok(config)
    }

    pub fn link_extractor(&self) -> ClientResult<LinkExtractor> {
        let mut patterns = LinkPatterns::from_domains(self.links.domains.iter().cloned());
        for custom in &self.links.patterns {
            let pattern = LinkPattern::with_regex(&custom.domain, &custom.pattern)
                .map_err(|e| ClientError::config(format!("[[links.patterns]] {e}")))?;
            patterns.set(pattern);
        }
        Ok(LinkExtractor::new(patterns).with_safelink_unwrapping(self.links.unwrap_safelinks))
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            max_title_length: self.display.max_title_length,
            show_attendees: self.display.show_attendees,
        }
    }

    pub fn scheduler(&self, links: LinkExtractor) -> Scheduler {
        Scheduler::new(links).with_window(
            self.notifications.window_start_secs..=self.notifications.window_end_secs,
        )
    }

    pub fn ledger_store(&self) -> FileLedgerStore {
        FileLedgerStore::new(self.ledger_path()).with_lock(self.notifications.use_lock)
    }

    pub fn dispatcher(&self) -> DesktopDispatcher {
        DesktopDispatcher::new(
            &self.notifications.app_name,
            Duration::from_secs(self.notifications.timeout_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.google.calendar_id, "primary");
        assert_eq!(config.notifications.window_start_secs, 240);
        assert_eq!(config.notifications.window_end_secs, 360);
        assert_eq!(config.notifications.app_name, "Calendar");
        assert!(config.notifications.enabled);
        assert!(config.display.show_attendees);
        assert_eq!(config.links.domains.len(), 4);
    }

    #[test]
    fn paths_follow_data_dir() {
        let config: ClientConfig = toml::from_str(
            r#"
            [general]
            data_dir = "/srv/calbar"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.ledger_path(),
            PathBuf::from("/srv/calbar/notified.json")
        );

        let google = config.google_config().unwrap();
        assert_eq!(
            google.credentials_path,
            PathBuf::from("/srv/calbar/credentials.json")
        );
        assert_eq!(google.token_path, PathBuf::from("/srv/calbar/token.json"));
    }

    #[test]
    fn explicit_files_override_data_dir() {
        let config: ClientConfig = toml::from_str(
            r#"
            [google]
            calendar_id = "team@example.com"
            credentials_file = "/etc/calbar/client.json"
            token_file = "/var/lib/calbar/token.json"
            loopback_port_range = [9000, 9005]

            [notifications]
            ledger_file = "/var/lib/calbar/ledger.json"
            use_lock = false
            "#,
        )
        .unwrap();
        let google = config.google_config().unwrap();
        assert_eq!(google.calendar_id, "team@example.com");
        assert_eq!(
            google.credentials_path,
            PathBuf::from("/etc/calbar/client.json")
        );
        assert_eq!(google.loopback_port_range, (9000, 9005));
        assert_eq!(
            config.ledger_path(),
            PathBuf::from("/var/lib/calbar/ledger.json")
        );
        assert!(!config.notifications.use_lock);
    }

    #[test]
    fn custom_link_pattern() {
        let config: ClientConfig = toml::from_str(
            r#"
            [links]
            domains = ["zoom.us"]

            [[links.patterns]]
            domain = "whereby.com"
            pattern = 'https://whereby\.com/[\w-]+'
            "#,
        )
        .unwrap();
        let links = config.link_extractor().unwrap();
        assert_eq!(links.patterns().len(), 2);
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let config: ClientConfig = toml::from_str(
            r#"
            [[links.patterns]]
            domain = "zoom.us"
            pattern = "https://(unclosed"
            "#,
        )
        .unwrap();
        assert!(matches!(config.link_extractor(), Err(ClientError::Config(_))));
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert!(toml::from_str::<ClientConfig>("[server]\nsocket = 1\n").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[display]\nmax_title_length = 20\nshow_attendees = false\n",
        )
        .unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        let options = config.format_options();
        assert_eq!(options.max_title_length, Some(20));
        assert!(!options.show_attendees);
    }

    #[test]
    fn load_rejects_inverted_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[notifications]\nwindow_start_secs = 400\nwindow_end_secs = 300\n",
        )
        .unwrap();
        assert!(matches!(ClientConfig::load_from(&path), Err(ClientError::Config(_))));
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ClientConfig::load_from(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn scheduler_uses_configured_window() {
        let config: ClientConfig =
            toml::from_str("[notifications]\nwindow_start_secs = 60\nwindow_end_secs = 120\n")
                .unwrap();
        let scheduler = config.scheduler(LinkExtractor::default());
        assert_eq!(scheduler.window(), &(60..=120));
    }
}
