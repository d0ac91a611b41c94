//! Error types for chaos-data

use thiserror::Error;

/// Data layer error type
#[derive(Debug, Error)]
pub enum Error {
    /// Data source not registered
    #[error("Dataset not found: {0}")]
    NotFound(String),

    /// Dataset file could not be loaded
    #[error("failed to load dataset {name}: {message}")]
    Load {
        /// Dataset name
        name: String,
        /// Underlying failure
        message: String,
    },

    /// Schema metadata file is malformed
    #[error("schema error: {0}")]
    Schema(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Sandbox error
    #[error(transparent)]
    Sandbox(#[from] chaos_sandbox::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
