//! The `calbar` SwiftBar plugin.
//!
//! Without arguments the binary prints today's and tomorrow's meetings in
//! SwiftBar's menu format and sends "starting soon" notifications. With
//! `login` it runs the interactive Google login in the terminal SwiftBar
//! opens for it.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod run;

use std::fmt::Display;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use chrono::{DateTime, TimeZone};
use tracing::{debug, error};

use calbar_core::{Menu, MenuFormatter, MenuRenderer, SwiftBarRenderer};
use calbar_notify::Notifier;
use calbar_providers::google::{GoogleCalendar, GoogleCredentials};

pub use cli::Cli;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use run::{Outcome, Plugin};

/// Set by SwiftBar to the plugin file it runs; actions must re-invoke it.
const PLUGIN_PATH_ENV: &str = "SWIFTBAR_PLUGIN_PATH";

/// Runs the command named on the command line, writing to `out`.
pub async fn run_cli<Tz, W>(cli: &Cli, now: &DateTime<Tz>, out: &mut W) -> ExitCode
where
    Tz: TimeZone,
    Tz::Offset: Display,
    W: Write,
{
    match execute(cli, now, out).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

/// Always writes something for the user; errors only come back from `login`.
async fn execute<Tz, W>(cli: &Cli, now: &DateTime<Tz>, out: &mut W) -> ClientResult<()>
where
    Tz: TimeZone,
    Tz::Offset: Display,
    W: Write,
{
    let renderer = SwiftBarRenderer::new(plugin_executable());

    if cli.is_login() {
        let result = login(cli, out).await;
        match &result {
            Ok(()) => {}
            Err(ClientError::CredentialsMissing { path }) => {
                let dir = path.parent().unwrap_or(Path::new("."));
                let menu = Menu::missing_credentials(dir.display());
                out.write_all(renderer.render(&menu).as_bytes())?;
            }
            Err(e) => writeln!(out, "Login failed: {e}")?,
        }
        return result;
    }

    let menu = match render(cli, now).await {
        Ok(menu) => menu,
        Err(e) => {
            error!(error = %e, "cannot run plugin");
            Menu::fetch_error(e)
        }
    };
    out.write_all(renderer.render(&menu).as_bytes())?;
    out.flush()?;
    Ok(())
}

async fn login<W: Write>(cli: &Cli, out: &mut W) -> ClientResult<()> {
    let config = load_config(cli)?;
    let google = config.google_config()?;
    let credentials = GoogleCredentials::new(google.clone())?;
    commands::login::login(&google, &credentials, out).await
}

async fn render<Tz>(cli: &Cli, now: &DateTime<Tz>) -> ClientResult<Menu>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let config = load_config(cli)?;
    let plugin = build_plugin(&config, !cli.no_notify)?;
    Ok(plugin.run(now).await.into_menu())
}

fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    match &cli.config {
        Some(path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
}

/// Wires the Google providers, formatter and (optionally) the notifier.
pub fn build_plugin(config: &ClientConfig, notify: bool) -> ClientResult<Plugin> {
    let google = config.google_config()?;
    let links = config.link_extractor()?;

    let credentials = GoogleCredentials::new(google.clone())?;
    let calendar = GoogleCalendar::new(&google)?;
    let mut plugin = Plugin::new(
        Box::new(credentials),
        Box::new(calendar),
        &google.calendar_id,
    )
    .with_formatter(MenuFormatter::new(config.format_options(), links.clone()));

    if notify && config.notifications.enabled {
        plugin = plugin.with_notifier(Notifier::new(
            config.scheduler(links),
            config.ledger_store(),
            config.dispatcher(),
        ));
    } else {
        debug!("notifications disabled");
    }
    Ok(plugin)
}

fn plugin_executable() -> String {
    if let Ok(path) = std::env::var(PLUGIN_PATH_ENV) {
        return path;
    }
    std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "calbar".to_string())
}
