//! Orchestrator tests

use super::review::{build_step_history, replan_context};
use super::*;
use crate::agents::{InfoSeeker, MockVerifier, Planner, Sensemaker};
use crate::approval::{FinalDecision, MockApprovalGate, PlanDecision};
use crate::error::{Error, Result};
use crate::plan::{Plan, PlanStep, StepEdit};
use crate::sensemaking::Termination;
use crate::state::ExecutionState;
use crate::types::{
    ErrorAttempt, FinalAnswer, QueryDecision, Recommendation, RecoveryGuidance, RetrievalOutcome,
    SeekContext, SensemakerResponse, Verification,
};
use chaos_data::{DataRegistry, QueryKind, QueryParams};
use chaos_sandbox::{ExecutionResult, InProcessExecutor, SandboxExecutor};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

// ── Scripted collaborators ──────────────────────────────────────────

#[derive(Default)]
struct ScriptedPlanner {
    plans: Mutex<VecDeque<Plan>>,
    sources: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Planner for ScriptedPlanner {
    async fn create_plan(&self, _query: &str, sources: &str) -> Result<Plan> {
        self.sources.lock().unwrap().push(sources.to_string());
        Ok(self.plans.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[derive(Default)]
struct ScriptedSensemaker {
    decisions: Mutex<VecDeque<SensemakerResponse>>,
}

#[async_trait::async_trait]
impl Sensemaker for ScriptedSensemaker {
    async fn decide(
        &self,
        _query: &str,
        _plan: &Plan,
        _state: &ExecutionState,
        _last: Option<&RetrievalOutcome>,
    ) -> Result<SensemakerResponse> {
        Ok(self
            .decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| complete("done")))
    }

    async fn guide_recovery(
        &self,
        _query: &str,
        _original_request: &str,
        _errors: &[ErrorAttempt],
        _sources: &str,
    ) -> Result<RecoveryGuidance> {
        Ok(RecoveryGuidance::default())
    }

    async fn best_effort_answer(
        &self,
        _query: &str,
        _plan: &Plan,
        _state: &ExecutionState,
    ) -> Result<FinalAnswer> {
        Ok(FinalAnswer {
            answer: "fallback".to_string(),
            evidence: vec![],
        })
    }
}

#[derive(Default)]
struct ScriptedSeeker {
    results: Mutex<VecDeque<&'static str>>,
    calls: Mutex<Vec<(String, SeekContext)>>,
}

#[async_trait::async_trait]
impl InfoSeeker for ScriptedSeeker {
    async fn seek(&self, request: &str, context: &SeekContext) -> Result<RetrievalOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((request.to_string(), context.clone()));
        let result = self.results.lock().unwrap().pop_front().unwrap_or("1");
        let mut params = QueryParams::new();
        params.insert("code".to_string(), format!("result = {}", result));
        Ok(RetrievalOutcome::from_execution(
            request,
            QueryDecision {
                source: "heart_rate".to_string(),
                kind: QueryKind::Exec,
                params,
            },
            ExecutionResult::ok(result.to_string()),
        ))
    }
}

struct Fixture {
    planner: Arc<ScriptedPlanner>,
    sensemaker: Arc<ScriptedSensemaker>,
    seeker: Arc<ScriptedSeeker>,
}

impl Fixture {
    fn new(plans: Vec<Plan>, decisions: Vec<SensemakerResponse>, results: Vec<&'static str>) -> Self {
        Self {
            planner: Arc::new(ScriptedPlanner {
                plans: Mutex::new(plans.into()),
                ..ScriptedPlanner::default()
            }),
            sensemaker: Arc::new(ScriptedSensemaker {
                decisions: Mutex::new(decisions.into()),
            }),
            seeker: Arc::new(ScriptedSeeker {
                results: Mutex::new(results.into()),
                ..ScriptedSeeker::default()
            }),
        }
    }

    fn orchestrator(&self, verifier: MockVerifier, gate: MockApprovalGate) -> Orchestrator {
        let registry = Arc::new(DataRegistry::new(Arc::new(SandboxExecutor::InProcess(
            InProcessExecutor::default(),
        ))));
        Orchestrator::new(
            self.planner.clone(),
            self.sensemaker.clone(),
            self.seeker.clone(),
            Arc::new(verifier),
            Arc::new(gate),
            registry,
        )
    }

    fn requests(&self) -> Vec<String> {
        self.seeker
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect()
    }
}

fn complete(answer: &str) -> SensemakerResponse {
    SensemakerResponse::Complete {
        answer: answer.to_string(),
        evidence: vec![],
    }
}

fn execute(step: u32, request: &str) -> SensemakerResponse {
    SensemakerResponse::Execute {
        step,
        request: request.to_string(),
        reasoning: String::new(),
    }
}

fn one_step_plan() -> Plan {
    Plan::new("", vec![PlanStep::new(1, "mean bpm").with_source("heart_rate")])
}

fn approving_verifier() -> MockVerifier {
    let mut verifier = MockVerifier::new();
    verifier.expect_verify().returning(|_, _, _, _| {
        Ok(Verification {
            is_complete: true,
            is_accurate: true,
            confidence_score: 0.9,
            recommendation: Recommendation::Approve,
            ..Verification::default()
        })
    });
    verifier
}

fn gate(plan: Vec<PlanDecision>, finals: Vec<FinalDecision>) -> MockApprovalGate {
    let mut gate = MockApprovalGate::new();
    let mut plan: VecDeque<PlanDecision> = plan.into();
    gate.expect_review_plan()
        .returning(move |_| Ok(plan.pop_front().unwrap_or(PlanDecision::Approve)));
    let mut finals: VecDeque<FinalDecision> = finals.into();
    gate.expect_final_review()
        .returning(move |_| Ok(finals.pop_front().unwrap_or(FinalDecision::Accept)));
    gate
}

// ── Runs ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_accepted_run() {
    let fixture = Fixture::new(
        vec![one_step_plan()],
        vec![execute(1, "mean bpm"), complete("Average is 60")],
        vec!["60.0"],
    );
    let mut orchestrator = fixture.orchestrator(approving_verifier(), gate(vec![], vec![]));

    let result = orchestrator.run("What is my average heart rate?").await.unwrap();
    assert_eq!(result.status, RunStatus::Accepted);
    assert_eq!(result.answer, "Average is 60");
    assert_eq!(result.termination, Some(Termination::Complete));
    assert!(!result.best_effort);
    assert_eq!(result.records.len(), 1);
    assert_eq!(
        result.plan.as_ref().unwrap().query,
        "What is my average heart rate?"
    );
    assert_eq!(
        result.verification.unwrap().recommendation,
        Recommendation::Approve
    );
    assert_eq!(
        fixture.planner.sources.lock().unwrap()[0],
        "No data sources available."
    );
}

#[tokio::test]
async fn test_plan_modified_before_execution() {
    let fixture = Fixture::new(
        vec![one_step_plan()],
        vec![execute(1, "ignored"), complete("ok")],
        vec!["58"],
    );
    let edits = vec![StepEdit {
        step: 1,
        action: "median bpm".to_string(),
    }];
    let mut orchestrator = fixture.orchestrator(
        approving_verifier(),
        gate(vec![PlanDecision::Modify(edits), PlanDecision::Approve], vec![]),
    );

    let result = orchestrator.run("q").await.unwrap();
    let plan = result.plan.unwrap();
    assert!(plan.steps[0].modified);
    assert_eq!(plan.steps[0].action, "median bpm");
    assert_eq!(fixture.requests(), vec!["median bpm"]);
}

#[tokio::test]
async fn test_plan_rejected() {
    let fixture = Fixture::new(vec![one_step_plan()], vec![], vec![]);
    let mut orchestrator =
        fixture.orchestrator(MockVerifier::new(), gate(vec![PlanDecision::Reject], vec![]));

    let result = orchestrator.run("q").await.unwrap();
    assert_eq!(result.status, RunStatus::Rejected);
    assert!(result.answer.is_empty());
    assert!(fixture.requests().is_empty());
}

#[tokio::test]
async fn test_cancel_resets_state() {
    let fixture = Fixture::new(
        vec![one_step_plan()],
        vec![execute(1, "mean bpm"), complete("60")],
        vec!["60.0"],
    );
    let mut orchestrator = fixture.orchestrator(
        approving_verifier(),
        gate(vec![], vec![FinalDecision::Cancel]),
    );

    let result = orchestrator.run("q").await.unwrap();
    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(orchestrator.state().records().is_empty());
    assert!(orchestrator
        .events()
        .events()
        .iter()
        .any(|e| e.message == "Run cancelled"));
}

#[tokio::test]
async fn test_empty_plan_skips_loop() {
    let fixture = Fixture::new(vec![Plan::default()], vec![], vec![]);
    let mut orchestrator = fixture.orchestrator(MockVerifier::new(), gate(vec![], vec![]));

    let result = orchestrator.run("hello").await.unwrap();
    assert_eq!(result.status, RunStatus::Accepted);
    assert_eq!(result.answer, EMPTY_PLAN_ANSWER);
    assert!(result.verification.is_none());
    assert!(fixture.requests().is_empty());
}

#[tokio::test]
async fn test_verifier_failure_is_not_fatal() {
    let fixture = Fixture::new(vec![one_step_plan()], vec![execute(1, "mean")], vec![]);
    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify()
        .returning(|_, _, _, _| Err(Error::Collaborator("timeout".to_string())));
    let mut orchestrator = fixture.orchestrator(verifier, gate(vec![], vec![]));

    let result = orchestrator.run("q").await.unwrap();
    let verification = result.verification.unwrap();
    assert_eq!(verification.recommendation, Recommendation::NeedsReview);
    assert!(verification.summary.contains("timeout"));
}

#[tokio::test]
async fn test_invalid_plan_is_an_error() {
    let plan = Plan::new("", vec![PlanStep::new(1, "a"), PlanStep::new(1, "b")]);
    let fixture = Fixture::new(vec![plan], vec![], vec![]);
    let mut orchestrator = fixture.orchestrator(MockVerifier::new(), gate(vec![], vec![]));

    assert!(matches!(
        orchestrator.run("q").await,
        Err(Error::InvalidPlan(_))
    ));
}

// ── Final review actions ────────────────────────────────────────────

#[tokio::test]
async fn test_revise_step_resumes_loop() {
    let fixture = Fixture::new(
        vec![one_step_plan()],
        vec![execute(1, "mean bpm"), complete("first"), complete("second")],
        vec!["60.0", "59"],
    );
    let mut orchestrator = fixture.orchestrator(
        approving_verifier(),
        gate(
            vec![],
            vec![FinalDecision::Revise {
                step: 1,
                request: "median bpm".to_string(),
            }],
        ),
    );

    let result = orchestrator.run("q").await.unwrap();
    assert_eq!(result.answer, "second");
    assert_eq!(fixture.requests(), vec!["mean bpm", "median bpm"]);
    let step = orchestrator.state().get_step_state(1).unwrap();
    assert_eq!(step.result.as_deref(), Some("59"));
    assert_eq!(
        result.records.iter().filter(|r| r.is_execution()).count(),
        2
    );
}

#[tokio::test]
async fn test_revise_unknown_step_is_ignored() {
    let fixture = Fixture::new(
        vec![one_step_plan()],
        vec![execute(1, "mean bpm"), complete("first")],
        vec!["60.0"],
    );
    let mut orchestrator = fixture.orchestrator(
        approving_verifier(),
        gate(
            vec![],
            vec![FinalDecision::Revise {
                step: 7,
                request: "x".to_string(),
            }],
        ),
    );

    let result = orchestrator.run("q").await.unwrap();
    assert_eq!(result.answer, "first");
    assert_eq!(fixture.requests().len(), 1);
}

#[tokio::test]
async fn test_add_step_runs_with_previous_results() {
    let fixture = Fixture::new(
        vec![one_step_plan()],
        vec![execute(1, "mean bpm"), complete("first"), complete("with count")],
        vec!["60.0", "3"],
    );
    let mut orchestrator = fixture.orchestrator(
        approving_verifier(),
        gate(
            vec![],
            vec![FinalDecision::AddStep {
                action: "count rows".to_string(),
            }],
        ),
    );

    let result = orchestrator.run("q").await.unwrap();
    assert_eq!(result.answer, "with count");
    let plan = result.plan.unwrap();
    assert_eq!(plan.steps.len(), 2);
    assert!(plan.steps[1].modified);

    let calls = fixture.seeker.calls.lock().unwrap().clone();
    assert_eq!(calls[1].0, "count rows");
    assert_eq!(calls[1].1.step, 2);
    assert_eq!(calls[1].1.previous_results[0].result, "60.0");
}

#[tokio::test]
async fn test_replan_with_learnings() {
    let second = Plan::new("", vec![PlanStep::new(1, "resting bpm")]);
    let fixture = Fixture::new(
        vec![one_step_plan(), second],
        vec![
            execute(1, "mean bpm"),
            complete("first"),
            execute(1, "resting bpm"),
            complete("replanned"),
        ],
        vec!["60.0", "52"],
    );
    let mut orchestrator = fixture.orchestrator(
        approving_verifier(),
        gate(
            vec![],
            vec![FinalDecision::Replan {
                feedback: Some("use resting heart rate".to_string()),
            }],
        ),
    );

    let result = orchestrator.run("q").await.unwrap();
    assert_eq!(result.answer, "replanned");
    assert_eq!(result.plan.unwrap().steps[0].action, "resting bpm");
    // state was reset for the new plan
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].result.as_deref(), Some("52"));

    let sources = fixture.planner.sources.lock().unwrap().clone();
    assert_eq!(sources.len(), 2);
    assert!(sources[1].contains("LEARNINGS FROM PREVIOUS ATTEMPT"));
    assert!(sources[1].contains("- Step 1 (mean bpm): 60.0"));
    assert!(sources[1].contains("USER FEEDBACK: use resting heart rate"));
}

#[tokio::test]
async fn test_rejected_replan_keeps_current_plan() {
    let fixture = Fixture::new(
        vec![one_step_plan(), Plan::new("", vec![PlanStep::new(1, "other")])],
        vec![execute(1, "mean bpm"), complete("first")],
        vec!["60.0"],
    );
    let mut orchestrator = fixture.orchestrator(
        approving_verifier(),
        gate(
            vec![PlanDecision::Approve, PlanDecision::Reject],
            vec![FinalDecision::Replan { feedback: None }],
        ),
    );

    let result = orchestrator.run("q").await.unwrap();
    assert_eq!(result.status, RunStatus::Accepted);
    assert_eq!(result.answer, "first");
    assert_eq!(result.plan.unwrap().steps[0].action, "mean bpm");
    assert_eq!(result.records.len(), 1);
}

#[tokio::test]
async fn test_final_reject() {
    let fixture = Fixture::new(
        vec![one_step_plan()],
        vec![execute(1, "mean bpm"), complete("first")],
        vec!["60.0"],
    );
    let mut orchestrator = fixture.orchestrator(
        approving_verifier(),
        gate(vec![], vec![FinalDecision::Reject]),
    );

    let result = orchestrator.run("q").await.unwrap();
    assert_eq!(result.status, RunStatus::Rejected);
    assert_eq!(result.answer, "first");
}

// ── Helpers ─────────────────────────────────────────────────────────

#[test]
fn test_build_step_history() {
    let plan = Plan::new(
        "q",
        vec![PlanStep::new(1, "a"), PlanStep::new(2, "b"), PlanStep::new(3, "c")],
    );
    let mut state = ExecutionState::new();
    state.record_result(1, "result = 1", Some("1".to_string()), true, None);
    state.record_result(2, "result = x", None, false, Some("boom".to_string()));

    let history = build_step_history(&plan, &state);
    assert_eq!(history.len(), 3);
    assert!(history[0].success);
    assert_eq!(history[1].result, "boom");
    assert!(!history[1].success);
    assert_eq!(history[2].result, "Not executed");

    let context = replan_context(&plan, &history, Some("  "));
    assert!(context.contains("- Step 2 (b): boom [failed]"));
    assert!(!context.contains("USER FEEDBACK"));
    assert!(context.ends_with("builds on what worked."));
}

#[test]
fn test_config_builders() {
    let config = OrchestratorConfig::new()
        .with_loop_config(crate::sensemaking::LoopConfig::new().with_max_retries(1))
        .with_verification(false);
    assert_eq!(config.loop_config.max_retries, 1);
    assert!(config.skip_verification);
    assert_eq!(RunStatus::Cancelled.as_str(), "cancelled");
}
