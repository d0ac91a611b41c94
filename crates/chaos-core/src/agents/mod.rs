//! Agents - the collaborators of the plan-execution engine
//!
//! Each collaborator is a trait so the engine can be driven by LLM-backed
//! implementations in production and by scripted ones in tests.
//!
//! - `planner`: question to plan
//! - `sensemaker`: per-turn decisions, recovery guidance, best-effort answers
//! - `info_seeker`: retrieval request to dataset query
//! - `verifier`: final answer check

mod info_seeker;
mod planner;
mod prompts;
mod sensemaker;
mod verifier;

#[cfg(test)]
mod tests;

pub use info_seeker::LlmInfoSeeker;
pub use planner::LlmPlanner;
pub use prompts::{
    BEST_EFFORT_SYSTEM_PROMPT, INFO_SEEKER_SYSTEM_PROMPT, PLANNER_SYSTEM_PROMPT,
    RECOVERY_SYSTEM_PROMPT, SENSEMAKER_SYSTEM_PROMPT, VERIFIER_SYSTEM_PROMPT,
};
pub use sensemaker::LlmSensemaker;
pub use verifier::LlmVerifier;

use crate::error::Result;
use crate::plan::Plan;
use crate::state::{ExecutionRecord, ExecutionState};
use crate::types::{
    ErrorAttempt, FinalAnswer, RecoveryGuidance, RetrievalOutcome, SeekContext,
    SensemakerResponse, Verification,
};
use chaos_llm::{CompletionRequest, Message};

/// Turns a question into a plan
#[async_trait::async_trait]
pub trait Planner: Send + Sync {
    /// Create a plan; `sources` describes the available datasets
    async fn create_plan(&self, query: &str, sources: &str) -> Result<Plan>;
}

/// Decides each turn of the sensemaking loop
#[async_trait::async_trait]
pub trait Sensemaker: Send + Sync {
    /// Decide the next move given the newest retrieval, if any
    async fn decide(
        &self,
        query: &str,
        plan: &Plan,
        state: &ExecutionState,
        last: Option<&RetrievalOutcome>,
    ) -> Result<SensemakerResponse>;

    /// Suggest how to recover from failed retrievals
    async fn guide_recovery(
        &self,
        query: &str,
        original_request: &str,
        errors: &[ErrorAttempt],
        sources: &str,
    ) -> Result<RecoveryGuidance>;

    /// Answer as well as possible from what was executed
    async fn best_effort_answer(
        &self,
        query: &str,
        plan: &Plan,
        state: &ExecutionState,
    ) -> Result<FinalAnswer>;
}

/// Serves retrieval requests
#[async_trait::async_trait]
pub trait InfoSeeker: Send + Sync {
    /// Run one retrieval; query failures are reported inside the outcome
    async fn seek(&self, request: &str, context: &SeekContext) -> Result<RetrievalOutcome>;
}

/// Checks a final answer
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Verifier: Send + Sync {
    /// Verify `answer` against the plan and the execution history
    async fn verify(
        &self,
        query: &str,
        answer: &str,
        plan: &Plan,
        records: &[ExecutionRecord],
    ) -> Result<Verification>;
}

/// Model settings shared by the LLM-backed agents
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Model; empty uses the provider default
    pub model: String,
    /// Maximum tokens per reply
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Re-asks after an unparseable reply
    pub max_retries: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: Some(4096),
            temperature: None,
            max_retries: chaos_llm::structured::DEFAULT_MAX_RETRIES,
        }
    }
}

impl LlmSettings {
    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Build a system + user request
    pub(crate) fn request(&self, system: &str, user: String) -> CompletionRequest {
        let mut request = CompletionRequest::new(self.model.clone())
            .with_message(Message::system(system))
            .with_message(Message::user(user));
        request.max_tokens = self.max_tokens;
        request.temperature = self.temperature;
        request
    }
}

/// Cut `text` to `max` characters, marking the cut
pub(crate) fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    }
}
