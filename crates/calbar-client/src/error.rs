//! Client error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use calbar_providers::ProviderError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The OAuth client file the user must supply is absent.
    #[error("credentials file not found: {}", path.display())]
    CredentialsMissing { path: PathBuf },
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
