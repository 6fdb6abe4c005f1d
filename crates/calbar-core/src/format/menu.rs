//! Menu model and the SwiftBar text renderer.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// App credentials file the user downloads from the Google console.
const CREDENTIALS_FILE: &str = "credentials.json";

/// One entry below the menu-bar header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MenuItem {
    /// Plain line, clickable when `href` is set.
    Text { text: String, href: Option<String> },
    Separator,
    /// Re-runs this program with `params`.
    Action {
        label: String,
        params: Vec<String>,
        terminal: bool,
        refresh: bool,
    },
    /// Asks the host to refresh the plugin.
    Refresh,
}

/// A header plus ordered items, independent of the host's format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub header: String,
    pub items: Vec<MenuItem>,
}

impl Menu {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            items: Vec::new(),
        }
    }

    pub fn add_item(&mut self, text: impl Into<String>) {
        self.items.push(MenuItem::Text {
            text: text.into(),
            href: None,
        });
    }

    pub fn add_link(&mut self, text: impl Into<String>, href: impl Into<String>) {
        self.items.push(MenuItem::Text {
            text: text.into(),
            href: Some(href.into()),
        });
    }

    pub fn add_separator(&mut self) {
        self.items.push(MenuItem::Separator);
    }

    pub fn add_action(
        &mut self,
        label: impl Into<String>,
        params: &[&str],
        terminal: bool,
        refresh: bool,
    ) {
        self.items.push(MenuItem::Action {
            label: label.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
            terminal,
            refresh,
        });
    }

    pub fn add_refresh(&mut self) {
        self.items.push(MenuItem::Refresh);
    }

    /// "Not logged in" menu with an action running `login` in a terminal.
    pub fn auth_required() -> Self {
        let mut menu = Self::new("🔑❌");
        menu.add_action("Login to Google Calendar", &["login"], true, true);
        menu
    }

    /// Degraded menu for a failed fetch.
    pub fn fetch_error(error: impl Display) -> Self {
        let mut menu = Self::new("📅 ⚠️");
        menu.add_item(format!("Error: {error}"));
        menu.add_action("Re-login", &["login"], true, true);
        menu
    }

    /// Shown by `login` when the app credentials file is absent.
    pub fn missing_credentials(data_dir: impl Display) -> Self {
        let mut menu = Self::new("🔑 Error");
        menu.add_item(format!("{CREDENTIALS_FILE} not found"));
        menu.add_item(format!("Place {CREDENTIALS_FILE} in {data_dir}"));
        menu
    }
}

/// Turns a [`Menu`] into the host's native text format.
pub trait MenuRenderer {
    fn render(&self, menu: &Menu) -> String;
}

/// SwiftBar / xbar plugin output.
///
/// Actions re-invoke `executable` with their params.
#[derive(Debug, Clone)]
pub struct SwiftBarRenderer {
    executable: String,
}

impl SwiftBarRenderer {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl MenuRenderer for SwiftBarRenderer {
    fn render(&self, menu: &Menu) -> String {
        let mut out = String::new();
        out.push_str(&sanitize(&menu.header));
        out.push('\n');
        out.push_str("---\n");

        for item in &menu.items {
            match item {
                MenuItem::Text { text, href: None } => out.push_str(&sanitize(text)),
                MenuItem::Text {
                    text,
                    href: Some(href),
                } => {
                    out.push_str(&format!("{} | href={}", sanitize(text), quote(href)));
                }
                MenuItem::Separator => out.push_str("---"),
                MenuItem::Action {
                    label,
                    params,
                    terminal,
                    refresh,
                } => {
                    out.push_str(&format!(
                        "{} | bash={}",
                        sanitize(label),
                        quote(&self.executable)
                    ));
                    for (i, param) in params.iter().enumerate() {
                        out.push_str(&format!(" param{i}={}", quote(param)));
                    }
                    out.push_str(&format!(" terminal={terminal} refresh={refresh}"));
                }
                MenuItem::Refresh => out.push_str("Refresh | refresh=true"),
            }
            out.push('\n');
        }
        out
    }
}

/// Keeps user text from being parsed as SwiftBar parameters or new lines.
fn sanitize(text: &str) -> String {
    text.replace(['\r', '\n'], " ").replace('|', "│")
}

fn quote(value: &str) -> String {
    if value.chars().any(|c| c.is_whitespace() || c == '"') {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}
