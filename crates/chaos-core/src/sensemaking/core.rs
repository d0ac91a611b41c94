//! Sensemaking loop core
//!
//! Contains the `SensemakingLoop` struct, its builder methods and the turn
//! loop itself.

use crate::agents::{InfoSeeker, Sensemaker};
use crate::approval::ApprovalGate;
use crate::error::Result;
use crate::events::EventSink;
use crate::plan::Plan;
use crate::state::ExecutionState;
use crate::types::{PreviousResult, RetrievalOutcome, SeekContext, SensemakerResponse};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::config::LoopConfig;
use super::types::{AttemptTracker, LoopOutcome, Termination};

pub(crate) const COMPONENT: &str = "sensemaker";

/// Drives a plan to an answer one turn at a time
pub struct SensemakingLoop {
    pub(crate) sensemaker: Arc<dyn Sensemaker>,
    pub(crate) info_seeker: Arc<dyn InfoSeeker>,
    pub(crate) approval: Arc<dyn ApprovalGate>,
    pub(crate) events: EventSink,
    pub(crate) config: LoopConfig,
    /// Dataset description handed to recovery guidance
    pub(crate) sources: String,
}

impl SensemakingLoop {
    /// Create a loop with default budgets
    #[must_use]
    pub fn new(
        sensemaker: Arc<dyn Sensemaker>,
        info_seeker: Arc<dyn InfoSeeker>,
        approval: Arc<dyn ApprovalGate>,
    ) -> Self {
        Self {
            sensemaker,
            info_seeker,
            approval,
            events: EventSink::default(),
            config: LoopConfig::default(),
            sources: String::new(),
        }
    }

    /// Use a shared event sink
    #[must_use]
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Set the budgets
    #[must_use]
    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the dataset description used for recovery guidance
    #[must_use]
    pub fn with_sources(mut self, sources: impl Into<String>) -> Self {
        self.sources = sources.into();
        self
    }

    /// Budgets in use
    #[must_use]
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Event sink in use
    #[must_use]
    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// Run the loop from the start of a plan
    pub async fn run(
        &self,
        query: &str,
        plan: &Plan,
        state: &mut ExecutionState,
    ) -> Result<LoopOutcome> {
        self.resume(query, plan, state, None).await
    }

    /// Run the loop, handing `last` to the first decision
    ///
    /// Used after a human re-ran or added a step at the final review.
    #[instrument(skip_all, fields(steps = plan.steps.len(), current_step = state.current_step()))]
    pub async fn resume(
        &self,
        query: &str,
        plan: &Plan,
        state: &mut ExecutionState,
        last: Option<RetrievalOutcome>,
    ) -> Result<LoopOutcome> {
        let mut tracker = AttemptTracker::new();
        let mut last = last;

        for iteration in 1..=self.config.max_iterations {
            let response = self
                .sensemaker
                .decide(query, plan, state, last.as_ref())
                .await?;

            match response {
                SensemakerResponse::Complete { answer, evidence } => {
                    info!(iteration, "Sensemaker answered");
                    self.events
                        .info(COMPONENT, format!("Answer ready after {} turns", iteration));
                    return Ok(LoopOutcome {
                        answer,
                        evidence,
                        termination: Termination::Complete,
                        iterations: iteration,
                    });
                }
                SensemakerResponse::Review {
                    affected_step,
                    issue,
                    proposed_fix,
                    reasoning,
                } => {
                    last = self
                        .handle_review(
                            query,
                            plan,
                            state,
                            &mut tracker,
                            affected_step,
                            issue,
                            proposed_fix,
                            reasoning,
                        )
                        .await?;
                }
                SensemakerResponse::Execute {
                    step,
                    request,
                    reasoning,
                } => {
                    if step == 0 {
                        warn!(iteration, "Sensemaker requested step 0");
                        last = Some(RetrievalOutcome::failure(
                            request,
                            "Step numbers start at 1",
                        ));
                        continue;
                    }

                    let repeats = tracker.observe(step);
                    if repeats >= self.config.max_step_attempts {
                        let termination = Termination::StepAttemptsExhausted {
                            step,
                            attempts: repeats + 1,
                        };
                        return self
                            .force_answer(query, plan, state, termination, iteration)
                            .await;
                    }

                    // Human-modified steps run exactly as written
                    let (request, allow_revision) = match plan.step(step) {
                        Some(planned) if planned.modified => (planned.action.clone(), false),
                        _ => (request, true),
                    };
                    debug!(step, repeats, %reasoning, "Executing step");
                    self.events
                        .info(COMPONENT, format!("Step {}: {}", step, request));

                    let context = SeekContext {
                        step,
                        errors: Vec::new(),
                        previous_results: previous_results(plan, state, step),
                    };
                    let seek = self
                        .seek_with_retries(query, step, &request, context, allow_revision, state)
                        .await?;
                    if seek.retries_exhausted {
                        self.events.warn(
                            COMPONENT,
                            format!("Step {} failed after {} attempts", step, seek.attempts),
                        );
                    }
                    last = Some(seek.outcome);
                }
            }
        }

        let iterations = self.config.max_iterations;
        self.force_answer(
            query,
            plan,
            state,
            Termination::MaxIterations { iterations },
            iterations,
        )
        .await
    }
}

/// Results of the plan steps before `step`, for the info seeker
pub(crate) fn previous_results(
    plan: &Plan,
    state: &ExecutionState,
    step: u32,
) -> Vec<PreviousResult> {
    plan.steps
        .iter()
        .filter(|s| s.step < step)
        .filter_map(|s| {
            let result = state.get_step_state(s.step)?.result.clone()?;
            Some(PreviousResult {
                step: s.step,
                action: s.action.clone(),
                result,
            })
        })
        .collect()
}
