//! Notification error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for notification operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors raised while persisting the ledger or dispatching alerts.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Reading or writing the ledger file failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The ledger could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The exclusive ledger lock could not be taken.
    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The desktop notification service rejected the alert.
    #[error("Dispatch error: {message}")]
    Dispatch { message: String },
}

impl NotifyError {
    pub fn lock(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Lock {
            path: path.into(),
            source,
        }
    }

    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
        }
    }
}
