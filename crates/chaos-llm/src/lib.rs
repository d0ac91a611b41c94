//! CHAOS LLM - LLM Provider Abstraction
//!
//! This crate provides LLM integration for the assistant:
//! - Provider: the `LlmProvider` trait
//! - OpenRouter: OpenAI-compatible chat completions gateway
//! - Structured: JSON replies validated against Rust types
//! - Mock: queued replies for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod error;
pub mod message;
pub mod mock;
pub mod openrouter;
pub mod provider;
pub mod structured;

pub use completion::{CompletionRequest, CompletionResponse, TokenUsage};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use mock::MockProvider;
pub use openrouter::{OpenRouterConfig, OpenRouterProvider};
pub use provider::LlmProvider;
pub use structured::{complete_json, extract_json, parse_json};
