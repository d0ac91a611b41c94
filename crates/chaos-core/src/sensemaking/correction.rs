//! Correction flow
//!
//! A `Review` decision puts the affected step on hold and asks the human.
//! Skipping keeps the original result; approving or modifying resets the
//! step and its attempt counter, then runs the corrected request.

use crate::approval::{CorrectionDecision, CorrectionRequest};
use crate::error::{Error, Result};
use crate::plan::Plan;
use crate::state::{ExecutionState, StepState};
use crate::types::{RetrievalOutcome, SeekContext};
use tracing::info;

use super::core::{previous_results, SensemakingLoop, COMPONENT};
use super::types::AttemptTracker;

impl SensemakingLoop {
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn handle_review(
        &self,
        query: &str,
        plan: &Plan,
        state: &mut ExecutionState,
        tracker: &mut AttemptTracker,
        affected_step: u32,
        issue: String,
        proposed_fix: String,
        reasoning: String,
    ) -> Result<Option<RetrievalOutcome>> {
        if affected_step == 0 {
            return Ok(Some(RetrievalOutcome::failure(
                proposed_fix,
                "Step numbers start at 1",
            )));
        }

        state.mark_needs_review(affected_step, issue.clone());
        self.events.warn(
            COMPONENT,
            format!("Step {} needs review: {}", affected_step, issue),
        );

        let request = CorrectionRequest {
            affected_step,
            issue,
            proposed_fix,
            reasoning,
        };
        let decision = self.approval.review_correction(&request).await?;

        let (corrected, allow_revision) = match decision {
            CorrectionDecision::Cancel => return Err(Error::Cancelled),
            CorrectionDecision::Skip => {
                let prior = state
                    .get_step_state(affected_step)
                    .and_then(|s| s.result.clone());
                state.set_step_state(affected_step, StepState::accepted(affected_step, prior))?;
                state.record_context(
                    affected_step,
                    format!(
                        "User kept the result of step {} despite: {}",
                        affected_step, request.issue
                    ),
                );
                info!(step = affected_step, "Correction skipped");
                return Ok(None);
            }
            CorrectionDecision::Approve => (request.proposed_fix.clone(), true),
            CorrectionDecision::Modify(text) if text.trim().is_empty() => {
                (request.proposed_fix.clone(), true)
            }
            CorrectionDecision::Modify(text) => (text, false),
        };

        state.record_context(
            affected_step,
            format!(
                "Correction of step {} ({}): {}",
                affected_step, request.issue, corrected
            ),
        );
        state.reset_step(affected_step);
        tracker.restart(affected_step);
        info!(step = affected_step, "Running correction");

        let context = SeekContext {
            step: affected_step,
            errors: Vec::new(),
            previous_results: previous_results(plan, state, affected_step),
        };
        let seek = self
            .seek_with_retries(query, affected_step, &corrected, context, allow_revision, state)
            .await?;
        Ok(Some(seek.outcome))
    }
}
