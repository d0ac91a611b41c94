//! LLM-backed sensemaker

use super::prompts::{BEST_EFFORT_SYSTEM_PROMPT, RECOVERY_SYSTEM_PROMPT, SENSEMAKER_SYSTEM_PROMPT};
use super::{clip, LlmSettings, Sensemaker};
use crate::error::Result;
use crate::plan::Plan;
use crate::state::ExecutionState;
use crate::types::{
    ErrorAttempt, FinalAnswer, RecoveryGuidance, RetrievalOutcome, SensemakerResponse,
};
use chaos_llm::{complete_json, LlmProvider};
use std::sync::Arc;
use tracing::{debug, instrument};

const CONTEXT_ENTRIES: usize = 20;
const RESULT_PREVIEW_CHARS: usize = 2000;

/// Sensemaker that asks a model for each decision
pub struct LlmSensemaker {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
}

impl LlmSensemaker {
    /// Create a sensemaker
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }
}

/// Plan steps annotated with their current status
fn plan_with_status(plan: &Plan, state: &ExecutionState) -> String {
    plan.steps
        .iter()
        .map(|s| {
            let mut line = format!("{}. [{}] {}", s.step, state.status(s.step), s.action);
            if !s.source.is_empty() {
                line.push_str(&format!(" (source: {})", s.source));
            }
            if s.modified {
                line.push_str(" [user-modified]");
            }
            if let Some(st) = state.get_step_state(s.step) {
                if st.user_accepted {
                    line.push_str(" [user accepted result]");
                }
                if let Some(text) = st.outcome_text() {
                    line.push_str(&format!("\n   -> {}", clip(text, 300)));
                }
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait::async_trait]
impl Sensemaker for LlmSensemaker {
    #[instrument(skip_all, fields(current_step = state.current_step()))]
    async fn decide(
        &self,
        query: &str,
        plan: &Plan,
        state: &ExecutionState,
        last: Option<&RetrievalOutcome>,
    ) -> Result<SensemakerResponse> {
        let newest = match last {
            None => "No new information yet.".to_string(),
            Some(outcome) if outcome.success() => format!(
                "Request: {}\nSource: {}\nCode:\n```\n{}\n```\nResult{}: {}",
                outcome.request,
                outcome.source,
                outcome.code(),
                if outcome.truncated { " (truncated)" } else { "" },
                clip(outcome.text(), RESULT_PREVIEW_CHARS)
            ),
            Some(outcome) => format!(
                "Request: {}\nSource: {}\nCode:\n```\n{}\n```\nFAILED: {}",
                outcome.request,
                outcome.source,
                outcome.code(),
                outcome.text()
            ),
        };

        let prompt = format!(
            "Query: {}\n\nPlan understanding: {}\n\nPlan steps:\n{}\n\n{}\n\nNewest retrieval:\n{}\n\nDecide the next move.",
            query,
            plan.query_understanding,
            plan_with_status(plan, state),
            state.context_for_llm(CONTEXT_ENTRIES),
            newest
        );
        let request = self.settings.request(SENSEMAKER_SYSTEM_PROMPT, prompt);
        let response: SensemakerResponse =
            complete_json(self.provider.as_ref(), request, self.settings.max_retries).await?;
        debug!(?response, "Sensemaker decision");
        Ok(response)
    }

    #[instrument(skip_all, fields(attempts = errors.len()))]
    async fn guide_recovery(
        &self,
        query: &str,
        original_request: &str,
        errors: &[ErrorAttempt],
        sources: &str,
    ) -> Result<RecoveryGuidance> {
        let history = errors
            .iter()
            .map(|e| format!("Attempt {}:\n  Request: {}\n  Error: {}", e.attempt, e.request, e.error))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "User query: {}\n\nOriginal request: {}\n\nFailed attempts:\n{}\n\n{}\n\nHow should the next attempt change?",
            query, original_request, history, sources
        );
        let request = self.settings.request(RECOVERY_SYSTEM_PROMPT, prompt);
        Ok(complete_json(self.provider.as_ref(), request, self.settings.max_retries).await?)
    }

    #[instrument(skip_all)]
    async fn best_effort_answer(
        &self,
        query: &str,
        plan: &Plan,
        state: &ExecutionState,
    ) -> Result<FinalAnswer> {
        let prompt = format!(
            "Query: {}\n\nPlan steps:\n{}\n\n{}",
            query,
            plan_with_status(plan, state),
            state.context_for_llm(CONTEXT_ENTRIES)
        );
        let request = self.settings.request(BEST_EFFORT_SYSTEM_PROMPT, prompt);
        Ok(complete_json(self.provider.as_ref(), request, self.settings.max_retries).await?)
    }
}
