//! LLM-backed info seeker
//!
//! The model picks a dataset and writes a snippet; the snippet runs through
//! the data registry, so failures come back as outcome errors that the
//! retry layer can feed into the next attempt.

use super::prompts::INFO_SEEKER_SYSTEM_PROMPT;
use super::{clip, InfoSeeker, LlmSettings};
use crate::error::Result;
use crate::types::{QueryDecision, RetrievalOutcome, SeekContext};
use chaos_data::DataRegistry;
use chaos_llm::{complete_json, LlmProvider};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Info seeker that asks a model for a query and runs it
pub struct LlmInfoSeeker {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<DataRegistry>,
    settings: LlmSettings,
}

impl LlmInfoSeeker {
    /// Create an info seeker over `registry`
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<DataRegistry>,
        settings: LlmSettings,
    ) -> Self {
        Self {
            provider,
            registry,
            settings,
        }
    }

    fn context_block(context: &SeekContext) -> String {
        let mut parts = Vec::new();
        if !context.previous_results.is_empty() {
            let mut lines = vec![
                "Results of earlier steps (use these values when the request refers to a step result):"
                    .to_string(),
            ];
            for prev in &context.previous_results {
                lines.push(format!(
                    "- step_{} ({}): {}",
                    prev.step,
                    prev.action,
                    clip(&prev.result, 500)
                ));
            }
            parts.push(lines.join("\n"));
        }
        if !context.errors.is_empty() {
            let mut lines =
                vec!["Previous attempts failed. Avoid repeating these errors:".to_string()];
            for e in &context.errors {
                lines.push(format!(
                    "- Attempt {}: request `{}` failed with: {}",
                    e.attempt, e.request, e.error
                ));
            }
            parts.push(lines.join("\n"));
        }
        parts.join("\n\n")
    }
}

#[async_trait::async_trait]
impl InfoSeeker for LlmInfoSeeker {
    #[instrument(skip(self, context), fields(step = context.step, retries = context.errors.len()))]
    async fn seek(&self, request: &str, context: &SeekContext) -> Result<RetrievalOutcome> {
        let sources = self.registry.sources_prompt().await;
        let extra = Self::context_block(context);
        let prompt = format!(
            "{}\n\nRequest: {}\n\n{}\n\nWrite the query as JSON.",
            sources, request, extra
        );
        let llm_request = self.settings.request(INFO_SEEKER_SYSTEM_PROMPT, prompt);
        let decision: QueryDecision =
            complete_json(self.provider.as_ref(), llm_request, self.settings.max_retries).await?;

        debug!(source = %decision.source, "Running query");
        let result = self
            .registry
            .query(&decision.source, decision.kind, &decision.params)
            .await;
        Ok(RetrievalOutcome::from_execution(request, decision, result))
    }
}
