//! calbar entry point.

use std::io;
use std::process::ExitCode;

use chrono::Local;
use clap::Parser;

use calbar_client::Cli;
use calbar_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout is the menu; logs go to stderr
    let tracing = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::plugin()
    }
    .with_format(cli.log_format.into());
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {e}");
    }

    let now = Local::now();
    let mut stdout = io::stdout().lock();
    calbar_client::run_cli(&cli, &now, &mut stdout).await
}
