//! Interactive Google login, run by the "Login to Google Calendar" action.

use std::io::Write;

use tracing::info;

use calbar_providers::CredentialProvider;
use calbar_providers::google::GoogleConfig;

use crate::error::{ClientError, ClientResult};

pub const SUCCESS_MESSAGE: &str = "Login successful! Refresh SwiftBar to see events.";

/// Checks for `credentials.json`, runs the browser flow and stores the token.
///
/// Progress goes to `out`, which is the terminal SwiftBar opened.
pub async fn login(
    config: &GoogleConfig,
    credentials: &dyn CredentialProvider,
    out: &mut impl Write,
) -> ClientResult<()> {
    if !config.has_credentials_file() {
        return Err(ClientError::CredentialsMissing {
            path: config.credentials_path.clone(),
        });
    }

    writeln!(out, "Starting Google Calendar login...")?;
    writeln!(
        out,
        "A browser window will open for you to authorize access."
    )?;
    out.flush()?;

    credentials.login().await?;
    info!(calendar_id = %config.calendar_id, "login complete");

    writeln!(out, "{SUCCESS_MESSAGE}")?;
    Ok(())
}
