use super::*;
use crate::plan::PlanStep;
use crate::state::ExecutionState;
use crate::types::{PreviousResult, Recommendation};
use chaos_data::DataRegistry;
use chaos_llm::MockProvider;
use chaos_sandbox::{InProcessExecutor, SandboxExecutor};
use std::sync::Arc;
use tempfile::TempDir;

fn provider(replies: &[&str]) -> Arc<MockProvider> {
    let provider = Arc::new(MockProvider::new());
    for reply in replies {
        provider.push_response(*reply);
    }
    provider
}

fn last_prompt(provider: &MockProvider) -> String {
    provider
        .requests()
        .last()
        .and_then(|r| r.messages.last().map(|m| m.content.clone()))
        .unwrap_or_default()
}

#[test]
fn test_clip() {
    assert_eq!(clip("short", 10), "short");
    assert_eq!(clip("abcdef", 3), "abc...");
    assert_eq!(clip("ééé", 2), "éé...");
}

#[test]
fn test_settings_request() {
    let settings = LlmSettings::default()
        .with_model("m")
        .with_max_tokens(100)
        .with_temperature(0.2);
    let request = settings.request("system", "user".to_string());
    assert_eq!(request.model, "m");
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.max_tokens, Some(100));
    assert_eq!(request.temperature, Some(0.2));
}

#[tokio::test]
async fn test_planner_parses_fenced_plan() {
    let provider = provider(&[
        "Here is the plan:\n```json\n{\"query_understanding\": \"average heart rate\", \"steps\": [{\"step\": 1, \"action\": \"mean of bpm\", \"source\": \"heart_rate\"}]}\n```",
    ]);
    let planner = LlmPlanner::new(provider.clone(), LlmSettings::default());

    let plan = planner
        .create_plan("What is my average heart rate?", "Available data sources:\n- heart_rate")
        .await
        .unwrap();
    assert_eq!(plan.query, "What is my average heart rate?");
    assert_eq!(plan.steps.len(), 1);
    assert_eq!(plan.steps[0].source, "heart_rate");
    assert!(last_prompt(&provider).contains("- heart_rate"));
}

#[tokio::test]
async fn test_planner_reasks_after_invalid_reply() {
    let provider = provider(&["I cannot do that", r#"{"steps": []}"#]);
    let planner = LlmPlanner::new(provider.clone(), LlmSettings::default());

    let plan = planner.create_plan("q", "").await.unwrap();
    assert!(plan.is_empty());
    assert_eq!(provider.requests().len(), 2);
}

#[tokio::test]
async fn test_sensemaker_decide_includes_state() {
    let provider = provider(&[r#"{"status": "needs_info", "current_step": 2, "request": "count rows"}"#]);
    let sensemaker = LlmSensemaker::new(provider.clone(), LlmSettings::default());

    let plan = Plan::new(
        "q",
        vec![
            PlanStep::new(1, "mean bpm").with_source("heart_rate"),
            PlanStep::new(2, "count rows").modified(),
        ],
    );
    let mut state = ExecutionState::new();
    state.record_result(1, "result = df['bpm'].mean()", Some("60.0".to_string()), true, None);

    let response = sensemaker.decide("q", &plan, &state, None).await.unwrap();
    assert!(matches!(response, SensemakerResponse::Execute { step: 2, .. }));

    let prompt = last_prompt(&provider);
    assert!(prompt.contains("1. [completed] mean bpm (source: heart_rate)"));
    assert!(prompt.contains("2. [pending] count rows [user-modified]"));
    assert!(prompt.contains("No new information yet."));
}

#[tokio::test]
async fn test_sensemaker_recovery_and_best_effort() {
    let provider = provider(&[
        r#"{"summary": "bad column", "revised_request": "use column bpm"}"#,
        r#"{"answer": "about 60", "supporting_evidence": ["step 1"]}"#,
    ]);
    let sensemaker = LlmSensemaker::new(provider.clone(), LlmSettings::default());

    let errors = vec![ErrorAttempt {
        attempt: 1,
        request: "mean of heart".to_string(),
        error: "Code execution failed: KeyError: 'heart'".to_string(),
    }];
    let guidance = sensemaker
        .guide_recovery("q", "mean of heart", &errors, "sources")
        .await
        .unwrap();
    assert_eq!(guidance.revised_request, "use column bpm");
    assert!(last_prompt(&provider).contains("KeyError"));

    let answer = sensemaker
        .best_effort_answer("q", &Plan::default(), &ExecutionState::new())
        .await
        .unwrap();
    assert_eq!(answer.answer, "about 60");
    assert_eq!(answer.evidence, vec!["step 1"]);
}

#[tokio::test]
async fn test_info_seeker_runs_query() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("heart_rate.csv"), "date,bpm\n2024-01-01,62\n2024-01-02,58\n").unwrap();
    let mut registry =
        DataRegistry::new(Arc::new(SandboxExecutor::InProcess(InProcessExecutor::default())));
    registry.auto_discover(dir.path()).unwrap();

    let provider = provider(&[
        r#"{"source": "heart_rate", "query_type": "exec", "params": {"code": "result = df['bpm'].mean()"}}"#,
        r#"{"source": "weather", "params": {"code": "result = 1"}}"#,
    ]);
    let seeker = LlmInfoSeeker::new(provider.clone(), Arc::new(registry), LlmSettings::default());

    let context = SeekContext {
        step: 1,
        errors: vec![],
        previous_results: vec![PreviousResult {
            step: 1,
            action: "load".to_string(),
            result: "ok".to_string(),
        }],
    };
    let outcome = seeker.seek("mean bpm", &context).await.unwrap();
    assert!(outcome.success());
    assert_eq!(outcome.text(), "60.0");
    assert_eq!(outcome.code(), "result = df['bpm'].mean()");
    let prompt = last_prompt(&provider);
    assert!(prompt.contains("heart_rate"));
    assert!(prompt.contains("- step_1 (load): ok"));

    let missing = seeker.seek("weather", &SeekContext::default()).await.unwrap();
    assert_eq!(missing.error.as_deref(), Some("Dataset not found: weather"));
}

#[tokio::test]
async fn test_verifier_normalizes_report() {
    let provider = provider(&[
        r#"{"is_complete": true, "is_accurate": true, "confidence_score": 0.9, "issues": ["rounding"], "recommendation": "approve"}"#,
    ]);
    let verifier = LlmVerifier::new(provider.clone(), LlmSettings::default());

    let mut state = ExecutionState::new();
    state.record_result(1, "result = 1", Some("1".to_string()), true, None);
    state.record_result(2, "result = x", None, false, Some("boom".to_string()));

    let report = verifier
        .verify("q", "1", &Plan::default(), state.records())
        .await
        .unwrap();
    assert!(!report.is_accurate);
    assert_eq!(report.recommendation, Recommendation::NeedsReview);

    let prompt = last_prompt(&provider);
    assert!(prompt.contains("Code executed: result = 1"));
    assert!(prompt.contains("Error: boom"));
}

#[test]
fn test_format_evidence_empty() {
    assert_eq!(
        verifier::format_evidence(&[]),
        "Evidence: No computations were executed"
    );
}
