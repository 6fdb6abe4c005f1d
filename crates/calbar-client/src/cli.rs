//! Command-line interface definition.
//!
//! SwiftBar runs the plugin without arguments. The only command is
//! `login`; any other argument, flag-like or not, falls through to a
//! normal render.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use calbar_core::TracingOutputFormat;

/// Today's and tomorrow's meetings for the macOS menu bar
#[derive(Debug, Parser)]
#[command(name = "calbar")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// `login` runs the interactive Google login; anything else renders the menu
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Path to configuration file
    #[arg(long, short, env = "CALBAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output on stderr
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Render the menu without sending notifications
    #[arg(long)]
    pub no_notify: bool,
}

impl Cli {
    pub fn is_login(&self) -> bool {
        self.args.first().map(String::as_str) == Some("login")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl From<LogFormat> for TracingOutputFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Compact => TracingOutputFormat::Compact,
            LogFormat::Pretty => TracingOutputFormat::Pretty,
            LogFormat::Json => TracingOutputFormat::Json,
        }
    }
}
