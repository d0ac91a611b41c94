//! Forced answers
//!
//! When a budget runs out the loop still answers: the sensemaker is asked
//! for its best effort, and if that fails an answer is assembled from the
//! successful executions. Forced answers are labeled and never an error.

use crate::error::{Error, Result};
use crate::plan::Plan;
use crate::state::ExecutionState;
use crate::types::FinalAnswer;
use tracing::warn;

use super::core::{SensemakingLoop, COMPONENT};
use super::types::{LoopOutcome, Termination};

/// Prefix of every forced answer
pub const BEST_EFFORT_LABEL: &str = "Best effort, could not fully complete: ";

impl SensemakingLoop {
    pub(crate) async fn force_answer(
        &self,
        query: &str,
        plan: &Plan,
        state: &ExecutionState,
        termination: Termination,
        iterations: u32,
    ) -> Result<LoopOutcome> {
        warn!(reason = %termination.describe(), "Forcing a best-effort answer");
        self.events.warn(
            COMPONENT,
            format!("Stopping early: {}", termination.describe()),
        );

        let answer = match self.sensemaker.best_effort_answer(query, plan, state).await {
            Ok(answer) if !answer.answer.trim().is_empty() => answer,
            Ok(_) => synthesize_answer(state),
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!(error = %e, "Best-effort answer unavailable, summarizing records");
                synthesize_answer(state)
            }
        };

        Ok(LoopOutcome {
            answer: format!("{}{}", BEST_EFFORT_LABEL, answer.answer),
            evidence: answer.evidence,
            termination,
            iterations,
        })
    }
}

/// Answer built from the successful executions alone
pub(crate) fn synthesize_answer(state: &ExecutionState) -> FinalAnswer {
    let evidence: Vec<String> = state
        .step_states()
        .values()
        .filter_map(|s| {
            let result = s.result.as_deref()?;
            Some(format!("Step {}: {}", s.step, result))
        })
        .collect();

    let answer = if evidence.is_empty() {
        "no step produced a result.".to_string()
    } else {
        format!("partial results were computed. {}", evidence.join("; "))
    };
    FinalAnswer { answer, evidence }
}
