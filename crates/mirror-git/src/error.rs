//! Error types for mirror-git

use std::path::PathBuf;

/// Result type for mirror-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mirror-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] mirror_fs::Error),

    #[error("Invalid credential method '{method}'. Valid methods are: ssh, https")]
    InvalidCredentials { method: String },

    #[error("Credential field '{field}' is required for {method} access")]
    MissingCredential { field: String, method: String },

    #[error("Remote '{name}' not found")]
    RemoteNotFound { name: String },

    #[error("Remote unreachable during {operation}: {message}")]
    RemoteUnreachable { operation: String, message: String },

    #[error("Checkout at {path} has a detached HEAD")]
    DetachedHead { path: PathBuf },

    #[error("Checkout at {path} has no working directory")]
    BareCheckout { path: PathBuf },
}

impl Error {
    pub(crate) fn unreachable(operation: &str, source: git2::Error) -> Self {
        Self::RemoteUnreachable {
            operation: operation.to_string(),
            message: source.message().to_string(),
        }
    }
}
