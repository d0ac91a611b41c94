//! LLM-backed planner

use super::prompts::PLANNER_SYSTEM_PROMPT;
use super::{LlmSettings, Planner};
use crate::error::Result;
use crate::plan::Plan;
use chaos_llm::{complete_json, LlmProvider};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Planner that asks a model for a JSON plan
pub struct LlmPlanner {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
}

impl LlmPlanner {
    /// Create a planner
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }
}

#[async_trait::async_trait]
impl Planner for LlmPlanner {
    #[instrument(skip(self, sources), fields(provider = self.provider.name()))]
    async fn create_plan(&self, query: &str, sources: &str) -> Result<Plan> {
        let prompt = format!(
            "Create an execution plan for the following query:\n\nQuery: {}\n\n{}\n\nRespond with a JSON plan.",
            query, sources
        );
        let request = self.settings.request(PLANNER_SYSTEM_PROMPT, prompt);
        let mut plan: Plan =
            complete_json(self.provider.as_ref(), request, self.settings.max_retries).await?;
        plan.query = query.to_string();
        debug!(steps = plan.steps.len(), "Plan created");
        Ok(plan)
    }
}
