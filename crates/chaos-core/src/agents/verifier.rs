//! LLM-backed verifier

use super::prompts::VERIFIER_SYSTEM_PROMPT;
use super::{clip, LlmSettings, Verifier};
use crate::error::Result;
use crate::plan::Plan;
use crate::state::{ExecutionRecord, RecordKind};
use crate::types::Verification;
use chaos_llm::{complete_json, LlmProvider};
use std::sync::Arc;
use tracing::instrument;

const EVIDENCE_RESULT_CHARS: usize = 500;

/// Verifier that asks a model for a report
pub struct LlmVerifier {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
}

impl LlmVerifier {
    /// Create a verifier
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }
}

/// Executed computations rendered as evidence
pub(crate) fn format_evidence(records: &[ExecutionRecord]) -> String {
    if records.is_empty() {
        return "Evidence: No computations were executed".to_string();
    }

    let mut lines = vec!["Evidence (executed computations):".to_string()];
    for record in records {
        match record.kind {
            RecordKind::Context => {
                lines.push(format!("\n  Step {} (context):", record.step));
                lines.push(format!("    {}", record.outcome_text()));
            }
            RecordKind::Execution => {
                lines.push(format!("\n  Step {}:", record.step));
                lines.push(format!("    Code executed: {}", record.code));
                match (&record.result, &record.error) {
                    (Some(result), _) if record.success => {
                        lines.push(format!("    Result: {}", clip(result, EVIDENCE_RESULT_CHARS)));
                    }
                    (_, Some(error)) => lines.push(format!("    Error: {}", error)),
                    _ => {}
                }
            }
        }
    }
    lines.join("\n")
}

#[async_trait::async_trait]
impl Verifier for LlmVerifier {
    #[instrument(skip_all, fields(records = records.len()))]
    async fn verify(
        &self,
        query: &str,
        answer: &str,
        plan: &Plan,
        records: &[ExecutionRecord],
    ) -> Result<Verification> {
        let prompt = format!(
            "Please verify the following answer against the execution plan:\n\nQuery: {}\n\nPlan understanding: {}\n\nPlan steps:\n{}\n\nAnswer: {}\n\n{}\n\nEvaluate this answer and provide a verification report as JSON.",
            query,
            plan.query_understanding,
            plan.format_steps(),
            answer,
            format_evidence(records)
        );
        let request = self.settings.request(VERIFIER_SYSTEM_PROMPT, prompt);
        let verification: Verification =
            complete_json(self.provider.as_ref(), request, self.settings.max_retries).await?;
        Ok(verification.normalized())
    }
}
