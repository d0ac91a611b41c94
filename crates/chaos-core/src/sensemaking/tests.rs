//! Sensemaking loop tests
//!
//! The sensemaker and info seeker are scripted; the approval gate is a
//! mockall mock.

use super::*;
use crate::agents::{InfoSeeker, Sensemaker};
use crate::approval::{CorrectionDecision, MockApprovalGate};
use crate::error::{Error, Result};
use crate::plan::{Plan, PlanStep};
use crate::state::{ExecutionState, StepStatus};
use crate::types::{
    ErrorAttempt, FinalAnswer, QueryDecision, RecoveryGuidance, RetrievalOutcome, SeekContext,
    SensemakerResponse,
};
use chaos_data::{QueryKind, QueryParams};
use chaos_sandbox::ExecutionResult;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

// ── Scripted collaborators ──────────────────────────────────────────

#[derive(Default)]
struct ScriptedSensemaker {
    decisions: Mutex<VecDeque<SensemakerResponse>>,
    /// Returned once the script runs out; `None` answers "done"
    repeat: Option<SensemakerResponse>,
    guidance: Mutex<VecDeque<Result<RecoveryGuidance>>>,
    best_effort: Option<String>,
    seen: Mutex<Vec<Option<RetrievalOutcome>>>,
    recovery_calls: Mutex<Vec<(String, Vec<ErrorAttempt>)>>,
    best_effort_calls: Mutex<u32>,
}

impl ScriptedSensemaker {
    fn new(decisions: Vec<SensemakerResponse>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
            ..Self::default()
        }
    }

    fn repeating(mut self, response: SensemakerResponse) -> Self {
        self.repeat = Some(response);
        self
    }

    fn with_guidance(self, guidance: Vec<Result<RecoveryGuidance>>) -> Self {
        *self.guidance.lock().unwrap() = guidance.into();
        self
    }

    fn with_best_effort(mut self, answer: &str) -> Self {
        self.best_effort = Some(answer.to_string());
        self
    }

    fn seen(&self) -> Vec<Option<RetrievalOutcome>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Sensemaker for ScriptedSensemaker {
    async fn decide(
        &self,
        _query: &str,
        _plan: &Plan,
        _state: &ExecutionState,
        last: Option<&RetrievalOutcome>,
    ) -> Result<SensemakerResponse> {
        self.seen.lock().unwrap().push(last.cloned());
        let next = self.decisions.lock().unwrap().pop_front();
        Ok(next.or_else(|| self.repeat.clone()).unwrap_or_else(|| complete("done")))
    }

    async fn guide_recovery(
        &self,
        _query: &str,
        original_request: &str,
        errors: &[ErrorAttempt],
        _sources: &str,
    ) -> Result<RecoveryGuidance> {
        self.recovery_calls
            .lock()
            .unwrap()
            .push((original_request.to_string(), errors.to_vec()));
        self.guidance
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RecoveryGuidance::default()))
    }

    async fn best_effort_answer(
        &self,
        _query: &str,
        _plan: &Plan,
        _state: &ExecutionState,
    ) -> Result<FinalAnswer> {
        *self.best_effort_calls.lock().unwrap() += 1;
        match &self.best_effort {
            Some(answer) => Ok(FinalAnswer {
                answer: answer.clone(),
                evidence: vec![],
            }),
            None => Err(Error::Collaborator("model unavailable".to_string())),
        }
    }
}

enum Reply {
    Ok(&'static str, &'static str),
    Fail(&'static str, &'static str),
    Broken,
}

#[derive(Default)]
struct ScriptedSeeker {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<(String, SeekContext)>>,
}

impl ScriptedSeeker {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(String, SeekContext)> {
        self.calls.lock().unwrap().clone()
    }

    fn requests(&self) -> Vec<String> {
        self.calls().into_iter().map(|(r, _)| r).collect()
    }
}

fn decision(code: &str) -> QueryDecision {
    let mut params = QueryParams::new();
    params.insert("code".to_string(), code.to_string());
    QueryDecision {
        source: "heart_rate".to_string(),
        kind: QueryKind::Exec,
        params,
    }
}

#[async_trait::async_trait]
impl InfoSeeker for ScriptedSeeker {
    async fn seek(&self, request: &str, context: &SeekContext) -> Result<RetrievalOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((request.to_string(), context.clone()));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Ok("result = 1", "1"));
        match reply {
            Reply::Ok(code, result) => Ok(RetrievalOutcome::from_execution(
                request,
                decision(code),
                ExecutionResult::ok(result.to_string()),
            )),
            Reply::Fail(code, error) => Ok(RetrievalOutcome::from_execution(
                request,
                decision(code),
                ExecutionResult::failure(error.to_string()),
            )),
            Reply::Broken => Err(Error::Collaborator("no JSON in reply".to_string())),
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

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

fn review(step: u32, issue: &str, fix: &str) -> SensemakerResponse {
    SensemakerResponse::Review {
        affected_step: step,
        issue: issue.to_string(),
        proposed_fix: fix.to_string(),
        reasoning: String::new(),
    }
}

fn two_step_plan() -> Plan {
    Plan::new(
        "What is my average heart rate?",
        vec![
            PlanStep::new(1, "Compute mean bpm").with_source("heart_rate"),
            PlanStep::new(2, "Compute resting bpm").with_source("heart_rate"),
        ],
    )
}

fn build(
    sensemaker: &Arc<ScriptedSensemaker>,
    seeker: &Arc<ScriptedSeeker>,
    gate: MockApprovalGate,
    config: LoopConfig,
) -> SensemakingLoop {
    SensemakingLoop::new(sensemaker.clone(), seeker.clone(), Arc::new(gate))
        .with_config(config)
        .with_sources("Available data sources:\n- heart_rate")
}

// ── Steps and retries ───────────────────────────────────────────────

#[tokio::test]
async fn test_single_step_answer() {
    let sensemaker = Arc::new(ScriptedSensemaker::new(vec![
        execute(1, "compute average of column bpm"),
        complete("The average is 42.5"),
    ]));
    let seeker = Arc::new(ScriptedSeeker::new(vec![Reply::Ok(
        "result = df['bpm'].mean()",
        "42.5",
    )]));
    let engine = build(&sensemaker, &seeker, MockApprovalGate::new(), LoopConfig::default());
    let plan = Plan::new("avg", vec![PlanStep::new(1, "compute average of column bpm")]);
    let mut state = ExecutionState::new();

    let outcome = engine.run("avg", &plan, &mut state).await.unwrap();
    assert!(outcome.answer.contains("42.5"));
    assert_eq!(outcome.termination, Termination::Complete);
    assert!(!outcome.best_effort());
    assert_eq!(outcome.iterations, 2);

    let step = state.get_step_state(1).unwrap();
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.result.as_deref(), Some("42.5"));
    assert_eq!(state.records().len(), 1);

    let seen = sensemaker.seen();
    assert!(seen[0].is_none());
    assert_eq!(seen[1].as_ref().unwrap().text(), "42.5");
}

#[tokio::test]
async fn test_retry_with_error_history() {
    let sensemaker = Arc::new(
        ScriptedSensemaker::new(vec![execute(1, "mean of heart"), complete("60")]).with_guidance(
            vec![
                Ok(RecoveryGuidance {
                    summary: "wrong column".to_string(),
                    revised_request: "mean of column bpm".to_string(),
                    ..RecoveryGuidance::default()
                }),
                Err(Error::Collaborator("rate limited".to_string())),
            ],
        ),
    );
    let seeker = Arc::new(ScriptedSeeker::new(vec![
        Reply::Fail("result = df['heart'].mean()", "Code execution failed: KeyError: 'heart'"),
        Reply::Fail("result = df['bpm'].avg()", "Code execution failed: no method avg"),
        Reply::Ok("result = df['bpm'].mean()", "60.0"),
    ]));
    let engine = build(&sensemaker, &seeker, MockApprovalGate::new(), LoopConfig::default());
    let mut state = ExecutionState::new();

    let outcome = engine.run("q", &two_step_plan(), &mut state).await.unwrap();
    assert_eq!(outcome.answer, "60");

    let records = state.records_for(1);
    let successes: Vec<bool> = records.iter().map(|r| r.success).collect();
    assert_eq!(successes, vec![false, false, true]);
    assert_eq!(state.status(1), StepStatus::Completed);

    let calls = seeker.calls();
    assert_eq!(calls[0].0, "mean of heart");
    assert!(calls[0].1.errors.is_empty());
    assert_eq!(calls[1].0, "mean of column bpm");
    assert_eq!(calls[1].1.errors.len(), 1);
    // failed guidance keeps the current request
    assert_eq!(calls[2].0, "mean of column bpm");
    assert_eq!(calls[2].1.errors.len(), 2);
    assert_eq!(calls[2].1.errors[1].attempt, 2);

    let recovery = sensemaker.recovery_calls.lock().unwrap().clone();
    assert_eq!(recovery.len(), 2);
    assert_eq!(recovery[1].0, "mean of heart");
}

#[tokio::test]
async fn test_retries_exhausted_hands_back_failure() {
    let sensemaker = Arc::new(ScriptedSensemaker::new(vec![
        execute(1, "mean"),
        complete("could not compute"),
    ]));
    let seeker = Arc::new(ScriptedSeeker::new(vec![
        Reply::Fail("a", "Code execution failed: one"),
        Reply::Fail("b", "Code execution failed: two"),
        Reply::Broken,
    ]));
    let engine = build(
        &sensemaker,
        &seeker,
        MockApprovalGate::new(),
        LoopConfig::default().with_max_retries(3),
    );
    let mut state = ExecutionState::new();

    engine.run("q", &two_step_plan(), &mut state).await.unwrap();
    assert_eq!(seeker.calls().len(), 3);
    assert_eq!(state.records_for(1).len(), 3);
    assert_eq!(state.status(1), StepStatus::Failed);

    let last = sensemaker.seen()[1].clone().unwrap();
    assert!(!last.success());
    assert!(last.text().contains("no JSON in reply"));
}

// ── Corrections ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_modify_correction_reruns_step() {
    let sensemaker = Arc::new(ScriptedSensemaker::new(vec![
        execute(1, "mean bpm"),
        execute(2, "resting bpm"),
        review(2, "result -1 is a sentinel value", "exclude -1 values"),
        complete("Resting bpm is 58"),
    ]));
    let seeker = Arc::new(ScriptedSeeker::new(vec![
        Reply::Ok("result = df['bpm'].mean()", "60.0"),
        Reply::Ok("result = df['bpm'].min()", "-1"),
        Reply::Ok("result = df[df['bpm'] > 0]['bpm'].min()", "58"),
    ]));
    let mut gate = MockApprovalGate::new();
    gate.expect_review_correction()
        .withf(|r| r.affected_step == 2 && r.proposed_fix == "exclude -1 values")
        .times(1)
        .returning(|_| Ok(CorrectionDecision::Modify("minimum of bpm above 0".to_string())));
    let engine = build(&sensemaker, &seeker, gate, LoopConfig::default());
    let mut state = ExecutionState::new();

    let outcome = engine.run("q", &two_step_plan(), &mut state).await.unwrap();
    assert_eq!(outcome.answer, "Resting bpm is 58");

    // step 1 untouched
    let step1 = state.get_step_state(1).unwrap();
    assert_eq!(step1.result.as_deref(), Some("60.0"));
    assert_eq!(state.records_for(1).len(), 1);

    // step 2 re-completed with the new result, old record kept
    let step2 = state.get_step_state(2).unwrap();
    assert_eq!(step2.status, StepStatus::Completed);
    assert_eq!(step2.result.as_deref(), Some("58"));
    let executions: Vec<_> = state
        .records_for(2)
        .into_iter()
        .filter(|r| r.is_execution())
        .collect();
    assert_eq!(executions.len(), 2);
    assert_eq!(executions[0].result.as_deref(), Some("-1"));

    assert_eq!(seeker.requests()[2], "minimum of bpm above 0");
    assert_eq!(seeker.calls()[2].1.previous_results.len(), 1);
}

#[tokio::test]
async fn test_approve_correction_uses_proposed_fix() {
    let sensemaker = Arc::new(ScriptedSensemaker::new(vec![
        execute(1, "mean bpm"),
        review(1, "includes zeros", "mean bpm excluding zeros"),
        complete("done"),
    ]));
    let seeker = Arc::new(ScriptedSeeker::new(vec![
        Reply::Ok("a", "30.0"),
        Reply::Ok("b", "60.0"),
    ]));
    let mut gate = MockApprovalGate::new();
    gate.expect_review_correction()
        .times(1)
        .returning(|_| Ok(CorrectionDecision::Approve));
    let engine = build(&sensemaker, &seeker, gate, LoopConfig::default());
    let mut state = ExecutionState::new();

    engine.run("q", &two_step_plan(), &mut state).await.unwrap();
    assert_eq!(seeker.requests()[1], "mean bpm excluding zeros");
    assert_eq!(state.get_step_state(1).unwrap().result.as_deref(), Some("60.0"));
    assert_eq!(sensemaker.seen()[2].as_ref().unwrap().text(), "60.0");
}

#[tokio::test]
async fn test_skip_correction_keeps_result() {
    let sensemaker = Arc::new(ScriptedSensemaker::new(vec![
        execute(1, "mean bpm"),
        review(1, "looks low", "recompute"),
        complete("done"),
    ]));
    let seeker = Arc::new(ScriptedSeeker::new(vec![Reply::Ok("a", "30.0")]));
    let mut gate = MockApprovalGate::new();
    gate.expect_review_correction()
        .times(1)
        .returning(|_| Ok(CorrectionDecision::Skip));
    let engine = build(&sensemaker, &seeker, gate, LoopConfig::default());
    let mut state = ExecutionState::new();

    engine.run("q", &two_step_plan(), &mut state).await.unwrap();
    assert_eq!(seeker.calls().len(), 1);

    let step = state.get_step_state(1).unwrap();
    assert_eq!(step.status, StepStatus::Completed);
    assert!(step.user_accepted);
    assert_eq!(step.result.as_deref(), Some("30.0"));
    assert!(state.records().iter().any(|r| !r.is_execution()));
    assert!(sensemaker.seen()[2].is_none());
}

#[tokio::test]
async fn test_cancel_correction() {
    let sensemaker = Arc::new(ScriptedSensemaker::new(vec![
        execute(1, "mean bpm"),
        review(1, "looks low", "recompute"),
    ]));
    let seeker = Arc::new(ScriptedSeeker::new(vec![Reply::Ok("a", "30.0")]));
    let mut gate = MockApprovalGate::new();
    gate.expect_review_correction()
        .returning(|_| Ok(CorrectionDecision::Cancel));
    let engine = build(&sensemaker, &seeker, gate, LoopConfig::default());
    let mut state = ExecutionState::new();

    let result = engine.run("q", &two_step_plan(), &mut state).await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

// ── Budgets ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_step_attempt_budget_forces_answer_once() {
    let sensemaker = Arc::new(
        ScriptedSensemaker::default()
            .repeating(execute(1, "mean bpm"))
            .with_best_effort("bpm is probably 60"),
    );
    let seeker = Arc::new(ScriptedSeeker::default());
    let engine = build(
        &sensemaker,
        &seeker,
        MockApprovalGate::new(),
        LoopConfig::default().with_max_step_attempts(2),
    );
    let mut state = ExecutionState::new();

    let outcome = engine.run("q", &two_step_plan(), &mut state).await.unwrap();
    assert_eq!(
        outcome.termination,
        Termination::StepAttemptsExhausted { step: 1, attempts: 3 }
    );
    assert!(outcome.best_effort());
    assert_eq!(outcome.answer, format!("{}bpm is probably 60", BEST_EFFORT_LABEL));
    assert_eq!(seeker.calls().len(), 2);
    assert_eq!(*sensemaker.best_effort_calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_review_resets_attempt_counter() {
    let sensemaker = Arc::new(ScriptedSensemaker::new(vec![
        execute(1, "mean bpm"),
        execute(1, "mean bpm again"),
        review(1, "includes zeros", "mean bpm excluding zeros"),
        execute(1, "mean bpm once more"),
        complete("60"),
    ]));
    let seeker = Arc::new(ScriptedSeeker::default());
    let mut gate = MockApprovalGate::new();
    gate.expect_review_correction()
        .returning(|_| Ok(CorrectionDecision::Approve));
    let engine = build(
        &sensemaker,
        &seeker,
        gate,
        LoopConfig::default().with_max_step_attempts(2),
    );
    let mut state = ExecutionState::new();

    let outcome = engine.run("q", &two_step_plan(), &mut state).await.unwrap();
    assert_eq!(outcome.termination, Termination::Complete);
    assert_eq!(seeker.calls().len(), 4);
}

#[tokio::test]
async fn test_max_iterations_synthesizes_answer() {
    let sensemaker = Arc::new(ScriptedSensemaker::new(vec![
        execute(1, "mean bpm"),
        execute(2, "resting bpm"),
        execute(1, "mean bpm"),
    ]));
    let seeker = Arc::new(ScriptedSeeker::new(vec![
        Reply::Ok("a", "60.0"),
        Reply::Ok("b", "52"),
        Reply::Ok("a", "60.0"),
    ]));
    let engine = build(
        &sensemaker,
        &seeker,
        MockApprovalGate::new(),
        LoopConfig::default().with_max_iterations(3),
    );
    let mut state = ExecutionState::new();

    let outcome = engine.run("q", &two_step_plan(), &mut state).await.unwrap();
    assert_eq!(outcome.termination, Termination::MaxIterations { iterations: 3 });
    assert!(outcome.answer.starts_with(BEST_EFFORT_LABEL));
    assert!(outcome.answer.contains("Step 2: 52"));
    assert_eq!(outcome.evidence, vec!["Step 1: 60.0", "Step 2: 52"]);
}

#[tokio::test]
async fn test_modified_step_runs_verbatim() {
    let plan = Plan::new(
        "q",
        vec![PlanStep::new(1, "count rows where bpm > 100").modified()],
    );
    let sensemaker = Arc::new(
        ScriptedSensemaker::new(vec![execute(1, "count fast heart beats"), complete("3")])
            .with_guidance(vec![Ok(RecoveryGuidance {
                revised_request: "something else".to_string(),
                ..RecoveryGuidance::default()
            })]),
    );
    let seeker = Arc::new(ScriptedSeeker::new(vec![
        Reply::Fail("a", "Code execution failed: bad"),
        Reply::Ok("b", "3"),
    ]));
    let engine = build(&sensemaker, &seeker, MockApprovalGate::new(), LoopConfig::default());
    let mut state = ExecutionState::new();

    engine.run("q", &plan, &mut state).await.unwrap();
    assert_eq!(
        seeker.requests(),
        vec!["count rows where bpm > 100", "count rows where bpm > 100"]
    );
    assert!(sensemaker.recovery_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_step_zero_is_not_recorded() {
    let sensemaker = Arc::new(ScriptedSensemaker::new(vec![execute(0, "mean"), complete("x")]));
    let seeker = Arc::new(ScriptedSeeker::default());
    let engine = build(&sensemaker, &seeker, MockApprovalGate::new(), LoopConfig::default());
    let mut state = ExecutionState::new();

    engine.run("q", &two_step_plan(), &mut state).await.unwrap();
    assert!(state.records().is_empty());
    assert!(seeker.calls().is_empty());
    assert!(!sensemaker.seen()[1].as_ref().unwrap().success());
}

#[tokio::test]
async fn test_events_are_emitted() {
    let sensemaker = Arc::new(ScriptedSensemaker::new(vec![execute(1, "mean"), complete("x")]));
    let seeker = Arc::new(ScriptedSeeker::default());
    let engine = build(&sensemaker, &seeker, MockApprovalGate::new(), LoopConfig::default());
    let mut state = ExecutionState::new();

    engine.run("q", &two_step_plan(), &mut state).await.unwrap();
    let events = engine.events().events();
    assert!(events.iter().any(|e| e.message == "Step 1: mean"));
    assert!(events.iter().all(|e| e.component == "sensemaker"));
}

#[test]
fn test_attempt_tracker() {
    let mut tracker = AttemptTracker::new();
    assert_eq!(tracker.observe(1), 0);
    assert_eq!(tracker.observe(1), 1);
    assert_eq!(tracker.observe(1), 2);
    assert_eq!(tracker.observe(2), 0);
    assert_eq!(tracker.observe(1), 0);
    tracker.observe(1);
    tracker.restart(1);
    assert_eq!(tracker.repeats(), 0);
    assert_eq!(tracker.step(), Some(1));
}

#[test]
fn test_loop_config_builders() {
    let config = LoopConfig::new()
        .with_max_retries(1)
        .with_max_step_attempts(2)
        .with_max_iterations(3);
    assert_eq!(config.max_retries, 1);
    assert_eq!(config.max_step_attempts, 2);
    assert_eq!(config.max_iterations, 3);
    assert_eq!(LoopConfig::default().max_iterations, 50);
}
