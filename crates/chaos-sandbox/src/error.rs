//! Error types for chaos-sandbox
//!
//! Every variant renders to the exact error string handed back inside an
//! [`ExecutionResult`](crate::ExecutionResult), so callers never need to
//! inspect the variant to report a failure.

use std::time::Duration;
use thiserror::Error;

/// Sandbox error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed request envelope
    #[error("Invalid JSON input: {0}")]
    InvalidInput(String),

    /// Request carried no code
    #[error("No code provided")]
    EmptyCode,

    /// The snippet failed to parse or raised during evaluation
    #[error("Code execution failed: {0}")]
    Execution(String),

    /// Requested dataset is not available
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// No dataset could be loaded at all
    #[error("No datasets found in {0}")]
    NoDatasets(String),

    /// A dataset file could not be read
    #[error("Failed to load dataset {name}: {message}")]
    Load {
        /// Dataset name
        name: String,
        /// Underlying failure
        message: String,
    },

    /// Execution exceeded its wall-clock budget
    #[error("Sandbox execution timed out after {}", format_duration(.0))]
    Timeout(Duration),

    /// The isolation runtime binary could not be launched
    #[error("Sandbox runtime '{0}' is not installed or not in PATH")]
    RuntimeUnavailable(String),

    /// The worker exited unsuccessfully
    #[error("Sandbox container failed (exit {code}): {stderr}")]
    WorkerFailed {
        /// Process exit code (-1 when killed by a signal)
        code: i32,
        /// Trimmed standard error
        stderr: String,
    },

    /// The worker answered with something that is not the response envelope
    #[error("Sandbox returned invalid JSON: {0}")]
    InvalidResponse(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Failure class used in logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) | Self::EmptyCode => "input",
            Self::Execution(_) => "execution",
            Self::Timeout(_) => "timeout",
            Self::DatasetNotFound(_)
            | Self::NoDatasets(_)
            | Self::Load { .. }
            | Self::RuntimeUnavailable(_)
            | Self::WorkerFailed { .. }
            | Self::InvalidResponse(_)
            | Self::Io(_) => "resource",
        }
    }

    pub(crate) fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}

fn format_duration(d: &Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
