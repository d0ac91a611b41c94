//! Main run
//!
//! Planning, the plan checkpoint, the sensemaking loop and verification.
//! Cancellation at any checkpoint clears the state and ends the run as
//! `cancelled` rather than as an error.

use crate::approval::{FinalDecision, FinalReviewRequest, PlanDecision};
use crate::error::{Error, Result};
use crate::plan::Plan;
use crate::sensemaking::{LoopOutcome, Termination};
use crate::types::Verification;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::core::Orchestrator;
use super::review::build_step_history;
use super::types::{RunResult, RunStatus, EMPTY_PLAN_ANSWER};

pub(crate) const COMPONENT: &str = "orchestrator";

impl Orchestrator {
    /// Answer one question
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&mut self, query: &str) -> Result<RunResult> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started = Instant::now();
        info!(%run_id, "Starting run");

        let result = match self.run_inner(run_id, query).await {
            Err(Error::Cancelled) => {
                warn!(%run_id, "Run cancelled");
                self.events.warn(COMPONENT, "Run cancelled");
                self.state.reset();
                Ok(RunResult::without_answer(
                    run_id,
                    RunStatus::Cancelled,
                    query,
                    None,
                ))
            }
            other => other,
        };

        result.map(|r| r.with_duration(started.elapsed().as_millis() as u64))
    }

    async fn run_inner(&mut self, run_id: Uuid, query: &str) -> Result<RunResult> {
        self.state.reset();
        let sources = self.registry.sources_prompt().await;
        self.engine.sources = sources.clone();

        let plan = self.create_plan(query, &sources).await?;
        let Some(plan) = self.approve_plan(plan).await? else {
            info!(%run_id, "Plan rejected");
            return Ok(RunResult::without_answer(
                run_id,
                RunStatus::Rejected,
                query,
                None,
            ));
        };

        let outcome = self.execute_plan(query, &plan).await?;
        self.final_review(run_id, query, plan, outcome, &sources)
            .await
    }

    /// Ask the planner for a validated plan
    pub(crate) async fn create_plan(&self, query: &str, sources: &str) -> Result<Plan> {
        let mut plan = self.planner.create_plan(query, sources).await?;
        plan.query = query.to_string();
        plan.validate()?;
        self.events.info(
            COMPONENT,
            format!("Plan with {} steps:\n{}", plan.steps.len(), plan.format_steps()),
        );
        Ok(plan)
    }

    /// Show the plan until it is approved; `None` means rejected
    pub(crate) async fn approve_plan(&self, mut plan: Plan) -> Result<Option<Plan>> {
        loop {
            match self.approval.review_plan(&plan).await? {
                PlanDecision::Approve => return Ok(Some(plan)),
                PlanDecision::Modify(edits) => {
                    let changed = plan.apply_edits(&edits);
                    plan.validate()?;
                    info!(changed, "Plan modified");
                    self.events
                        .info(COMPONENT, format!("{} plan steps modified", changed));
                }
                PlanDecision::Reject => return Ok(None),
                PlanDecision::Cancel => return Err(Error::Cancelled),
            }
        }
    }

    /// Run the loop over a fresh state; an empty plan is answered directly
    pub(crate) async fn execute_plan(&mut self, query: &str, plan: &Plan) -> Result<LoopOutcome> {
        if plan.is_empty() {
            info!("Empty plan, nothing to execute");
            return Ok(LoopOutcome {
                answer: EMPTY_PLAN_ANSWER.to_string(),
                evidence: Vec::new(),
                termination: Termination::Complete,
                iterations: 0,
            });
        }
        self.engine.run(query, plan, &mut self.state).await
    }

    /// Verify an answer; a failing verifier yields an `unavailable` report
    pub(crate) async fn verify(&self, query: &str, answer: &str, plan: &Plan) -> Result<Verification> {
        if self.config.skip_verification {
            return Ok(Verification::unavailable("verification disabled"));
        }
        match self
            .verifier
            .verify(query, answer, plan, self.state.records())
            .await
        {
            Ok(report) => Ok(report.normalized()),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                warn!(error = %e, "Verification failed");
                Ok(Verification::unavailable(e.to_string()))
            }
        }
    }

    async fn final_review(
        &mut self,
        run_id: Uuid,
        query: &str,
        mut plan: Plan,
        mut outcome: LoopOutcome,
        sources: &str,
    ) -> Result<RunResult> {
        loop {
            let verification = if plan.is_empty() {
                None
            } else {
                Some(self.verify(query, &outcome.answer, &plan).await?)
            };

            let request = FinalReviewRequest {
                answer: outcome.answer.clone(),
                evidence: outcome.evidence.clone(),
                verification: verification
                    .clone()
                    .unwrap_or_else(|| Verification::unavailable("nothing was executed")),
                steps: build_step_history(&plan, &self.state),
                best_effort: outcome.best_effort(),
            };

            let status = match self.approval.final_review(&request).await? {
                FinalDecision::Accept => RunStatus::Accepted,
                FinalDecision::Reject => RunStatus::Rejected,
                FinalDecision::Cancel => return Err(Error::Cancelled),
                FinalDecision::Revise { step, request } => {
                    if let Some(revised) = self.revise_step(query, &plan, step, &request).await? {
                        outcome = revised;
                    }
                    continue;
                }
                FinalDecision::AddStep { action } => {
                    if let Some(extended) = self.add_step(query, &mut plan, &action).await? {
                        outcome = extended;
                    }
                    continue;
                }
                FinalDecision::Replan { feedback } => {
                    if let Some((new_plan, new_outcome)) = self
                        .replan(query, &plan, feedback.as_deref(), sources)
                        .await?
                    {
                        plan = new_plan;
                        outcome = new_outcome;
                    }
                    continue;
                }
            };

            info!(%run_id, status = status.as_str(), "Run finished");
            self.events
                .info(COMPONENT, format!("Run {}", status.as_str()));
            return Ok(RunResult::answered(
                run_id,
                status,
                query,
                outcome,
                verification,
                plan,
                self.state.export(),
            ));
        }
    }
}
