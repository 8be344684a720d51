//! Error types for mirror-core

use std::path::PathBuf;

/// Result type for mirror-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mirror-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or missing configuration, detected before any side effect
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Every generated slot name for a source was already taken
    #[error("Could not allocate a unique slot for {source_path} after {attempts} attempts")]
    SlotExhausted { source_path: PathBuf, attempts: usize },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from mirror-fs
    #[error(transparent)]
    Fs(#[from] mirror_fs::Error),

    /// Git error from mirror-git
    #[error(transparent)]
    Git(#[from] mirror_git::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
