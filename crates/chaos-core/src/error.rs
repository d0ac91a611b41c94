//! Error types for chaos-core
//!
//! This module provides error types and user-friendly error formatting.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// LLM provider error
    #[error("llm error: {0}")]
    Llm(#[from] chaos_llm::Error),

    /// Data layer error
    #[error("data error: {0}")]
    Data(#[from] chaos_data::Error),

    /// Plan failed validation
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// Execution state misuse
    #[error("state error: {0}")]
    State(String),

    /// A collaborator could not produce a usable answer
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// The human aborted at a checkpoint
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Llm(chaos_llm::Error::NotConfigured(msg)) => {
                format!("🔑 LLM provider is not configured: {}", msg)
            }
            Error::Llm(chaos_llm::Error::RateLimit) => {
                "⏳ Rate limit exceeded. Please try again later.".to_string()
            }
            Error::Llm(e) => format!("🤖 LLM error: {}", e),
            Error::Data(e) => format!("📊 Data error: {}", e),
            Error::InvalidPlan(msg) => format!("📋 The plan is not usable: {}", msg),
            Error::State(msg) => format!("❌ Internal state error: {}", msg),
            Error::Collaborator(msg) => format!("🤖 Agent error: {}", msg),
            Error::Cancelled => "✋ Operation cancelled.".to_string(),
            Error::Config(msg) => format!("⚙️ Configuration error: {}", msg),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Llm(chaos_llm::Error::NotConfigured(_)) => Some(
                "💡 Set the OPENROUTER_API_KEY environment variable or add it to .env.".to_string(),
            ),
            Error::Llm(chaos_llm::Error::Network(_) | chaos_llm::Error::Timeout(_)) => {
                Some("💡 Check your internet connection and the [llm] base_url setting.".to_string())
            }
            Error::Llm(chaos_llm::Error::RateLimit) => {
                Some("💡 Try a different model or wait before retrying.".to_string())
            }
            Error::Llm(e) if e.is_structured_output() => Some(
                "💡 The model's answer could not be read. Retry, or raise [engine] max_retries.".to_string(),
            ),
            Error::Data(_) => {
                Some("💡 Run `chaos datasets` to see which datasets were found.".to_string())
            }
            Error::InvalidPlan(_) => {
                Some("💡 Try rephrasing the question more specifically.".to_string())
            }
            Error::Config(_) => {
                Some("💡 Check config/default.toml, config/local.toml and CHAOS__* variables.".to_string())
            }
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = error.user_message();
    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }
    output
}
