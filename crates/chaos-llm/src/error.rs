//! Error types for chaos-llm
//!
//! Transport failures and structured-output failures are kept apart:
//! only the latter are worth re-asking the model about.

use thiserror::Error;

/// LLM error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not configured
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Provider rejected the request
    #[error("api error: {0}")]
    Api(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimit,

    /// Provider envelope could not be read
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Model reply holds no JSON object
    #[error("reply contains no JSON object")]
    MissingJson,

    /// Model reply holds JSON that does not fit the requested shape
    #[error("reply does not match the requested format: {0}")]
    Schema(#[from] serde_json::Error),

    /// Every attempt at a structured reply failed
    #[error("no valid structured reply after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of completions requested
        attempts: u32,
        /// Parse failure of the final reply
        last: Box<Error>,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

impl Error {
    /// Whether the model answered but the answer could not be used
    #[must_use]
    pub fn is_structured_output(&self) -> bool {
        matches!(
            self,
            Self::MissingJson | Self::Schema(_) | Self::RetriesExhausted { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
