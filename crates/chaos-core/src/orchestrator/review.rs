//! Final review actions
//!
//! After the answer is shown the human can re-run one step with a new
//! request, append a step, or ask for a fresh plan informed by what the
//! previous attempt found. Human-written requests are never rewritten.

use crate::approval::StepSummary;
use crate::error::Result;
use crate::plan::Plan;
use crate::sensemaking::{previous_results, LoopOutcome};
use crate::state::ExecutionState;
use crate::types::SeekContext;
use tracing::{info, warn};

use super::core::Orchestrator;
use super::process::COMPONENT;

const NOT_EXECUTED: &str = "Not executed";

impl Orchestrator {
    /// Re-run `step` with `request`, then resume the loop
    ///
    /// Returns `None` when the step is not part of the plan.
    pub(crate) async fn revise_step(
        &mut self,
        query: &str,
        plan: &Plan,
        step: u32,
        request: &str,
    ) -> Result<Option<LoopOutcome>> {
        if plan.step(step).is_none() || request.trim().is_empty() {
            warn!(step, "Ignoring revision of unknown step");
            self.events
                .warn(COMPONENT, format!("Step {} is not part of the plan", step));
            return Ok(None);
        }

        info!(step, "Revising step");
        self.state
            .record_context(step, format!("User revised step {}: {}", step, request));
        self.state.reset_step(step);

        let context = SeekContext {
            step,
            errors: Vec::new(),
            previous_results: previous_results(plan, &self.state, step),
        };
        let seek = self
            .engine
            .seek_with_retries(query, step, request, context, false, &mut self.state)
            .await?;
        let outcome = self
            .engine
            .resume(query, plan, &mut self.state, Some(seek.outcome))
            .await?;
        Ok(Some(outcome))
    }

    /// Append a human-written step, run it, then resume the loop
    pub(crate) async fn add_step(
        &mut self,
        query: &str,
        plan: &mut Plan,
        action: &str,
    ) -> Result<Option<LoopOutcome>> {
        let action = action.trim();
        if action.is_empty() {
            return Ok(None);
        }

        let step = plan.push_user_step(action);
        info!(step, "Adding step");
        self.state
            .record_context(step, format!("User added step {}: {}", step, action));

        let context = SeekContext {
            step,
            errors: Vec::new(),
            previous_results: previous_results(plan, &self.state, step),
        };
        let seek = self
            .engine
            .seek_with_retries(query, step, action, context, false, &mut self.state)
            .await?;
        let outcome = self
            .engine
            .resume(query, plan, &mut self.state, Some(seek.outcome))
            .await?;
        Ok(Some(outcome))
    }

    /// Plan again with the learnings of the previous attempt
    ///
    /// Returns `None` when the new plan is rejected; the current plan and
    /// its state are kept in that case.
    pub(crate) async fn replan(
        &mut self,
        query: &str,
        plan: &Plan,
        feedback: Option<&str>,
        sources: &str,
    ) -> Result<Option<(Plan, LoopOutcome)>> {
        let learnings = replan_context(plan, &build_step_history(plan, &self.state), feedback);
        let new_plan = self
            .create_plan(query, &format!("{}\n\n{}", sources, learnings))
            .await?;

        let Some(new_plan) = self.approve_plan(new_plan).await? else {
            info!("Replan rejected, keeping the current plan");
            self.events
                .info(COMPONENT, "New plan rejected, keeping the current one");
            return Ok(None);
        };

        self.state.reset();
        let outcome = self.execute_plan(query, &new_plan).await?;
        Ok(Some((new_plan, outcome)))
    }
}

/// Latest result of every plan step
pub(crate) fn build_step_history(plan: &Plan, state: &ExecutionState) -> Vec<StepSummary> {
    plan.steps
        .iter()
        .map(|s| {
            let (code, result, success) = match state.latest_execution(s.step) {
                Some(record) => (
                    record.code.clone(),
                    record.outcome_text().to_string(),
                    record.success,
                ),
                None => (String::new(), NOT_EXECUTED.to_string(), false),
            };
            StepSummary {
                step: s.step,
                action: s.action.clone(),
                source: s.source.clone(),
                code,
                result,
                success,
            }
        })
        .collect()
}

/// Planner context describing the previous attempt
pub(crate) fn replan_context(
    plan: &Plan,
    history: &[StepSummary],
    feedback: Option<&str>,
) -> String {
    let mut lines = vec![
        "LEARNINGS FROM PREVIOUS ATTEMPT:".to_string(),
        "Previous plan:".to_string(),
        plan.format_steps(),
        String::new(),
        "Step results:".to_string(),
    ];
    for summary in history {
        let marker = if summary.success { "" } else { " [failed]" };
        lines.push(format!(
            "- Step {} ({}): {}{}",
            summary.step, summary.action, summary.result, marker
        ));
    }
    if let Some(feedback) = feedback.map(str::trim).filter(|f| !f.is_empty()) {
        lines.push(String::new());
        lines.push(format!("USER FEEDBACK: {}", feedback));
    }
    lines.push(String::new());
    lines.push(
        "Create a FRESH plan that avoids the problems above and builds on what worked."
            .to_string(),
    );
    lines.join("\n")
}
