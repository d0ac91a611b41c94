//! Approval - human checkpoints
//!
//! The engine never talks to a terminal. At each checkpoint it hands a
//! request to an [`ApprovalGate`] and suspends until a decision comes back,
//! so an interactive prompt, a scripted test or a non-interactive front end
//! ([`AutoApprove`]) can drive the same core.

use crate::error::Result;
use crate::plan::{Plan, StepEdit};
use crate::types::Verification;
use serde::{Deserialize, Serialize};

/// Decision on a proposed plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "edits", rename_all = "snake_case")]
pub enum PlanDecision {
    /// Execute the plan as shown
    Approve,
    /// Edit steps and show the plan again
    Modify(Vec<StepEdit>),
    /// Drop the plan
    Reject,
    /// Abort the run
    Cancel,
}

/// Correction proposed by the sensemaker for a suspicious result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionRequest {
    /// Step whose result is suspicious
    pub affected_step: u32,
    /// What looks wrong
    pub issue: String,
    /// Retrieval request that would fix it
    pub proposed_fix: String,
    /// Why the fix is proposed
    pub reasoning: String,
}

/// Decision on a proposed correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "request", rename_all = "snake_case")]
pub enum CorrectionDecision {
    /// Run the proposed fix verbatim
    Approve,
    /// Run this request instead
    Modify(String),
    /// Keep the original result
    Skip,
    /// Abort the run
    Cancel,
}

/// Summary of one plan step for the final review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSummary {
    /// Step number
    pub step: u32,
    /// Step action
    pub action: String,
    /// Step source
    pub source: String,
    /// Latest snippet
    pub code: String,
    /// Latest result or error, or `Not executed`
    pub result: String,
    /// Whether the latest execution succeeded
    pub success: bool,
}

/// Everything the human sees at the final review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReviewRequest {
    /// Proposed answer
    pub answer: String,
    /// Supporting evidence
    pub evidence: Vec<String>,
    /// Verifier report
    pub verification: Verification,
    /// Per-step results
    pub steps: Vec<StepSummary>,
    /// The loop was cut short
    pub best_effort: bool,
}

/// Decision at the final review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum FinalDecision {
    /// Accept the answer
    Accept,
    /// Reject the answer
    Reject,
    /// Re-run one step with a revised request, then resume
    Revise {
        /// Step to revise
        step: u32,
        /// Revised request
        request: String,
    },
    /// Append a step, run it, then resume
    AddStep {
        /// Action of the new step
        action: String,
    },
    /// Plan again using what was learned
    Replan {
        /// Optional guidance for the planner
        feedback: Option<String>,
    },
    /// Abort the run
    Cancel,
}

/// Human-approval checkpoints
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ApprovalGate: Send + Sync {
    /// Review a proposed plan
    async fn review_plan(&self, plan: &Plan) -> Result<PlanDecision>;

    /// Review a proposed correction
    async fn review_correction(&self, request: &CorrectionRequest) -> Result<CorrectionDecision>;

    /// Review the final answer
    async fn final_review(&self, review: &FinalReviewRequest) -> Result<FinalDecision>;
}

/// Gate that approves everything without asking
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait::async_trait]
impl ApprovalGate for AutoApprove {
    async fn review_plan(&self, _plan: &Plan) -> Result<PlanDecision> {
        Ok(PlanDecision::Approve)
    }

    async fn review_correction(&self, _request: &CorrectionRequest) -> Result<CorrectionDecision> {
        Ok(CorrectionDecision::Approve)
    }

    async fn final_review(&self, _review: &FinalReviewRequest) -> Result<FinalDecision> {
        Ok(FinalDecision::Accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_auto_approve() {
        let gate = AutoApprove;
        assert_eq!(
            gate.review_plan(&Plan::default()).await.unwrap(),
            PlanDecision::Approve
        );
        let correction = CorrectionRequest {
            affected_step: 2,
            issue: "-1".to_string(),
            proposed_fix: "exclude -1".to_string(),
            reasoning: String::new(),
        };
        assert_eq!(
            gate.review_correction(&correction).await.unwrap(),
            CorrectionDecision::Approve
        );
        let review = FinalReviewRequest {
            answer: "42".to_string(),
            evidence: vec![],
            verification: Verification::default(),
            steps: vec![],
            best_effort: false,
        };
        assert_eq!(gate.final_review(&review).await.unwrap(), FinalDecision::Accept);
    }

    #[test]
    fn test_decision_serialization() {
        let json = serde_json::to_value(CorrectionDecision::Modify("use median".to_string())).unwrap();
        assert_eq!(json["decision"], "modify");
        assert_eq!(json["request"], "use median");

        let json = serde_json::to_value(FinalDecision::Revise {
            step: 2,
            request: "recount".to_string(),
        })
        .unwrap();
        assert_eq!(json["decision"], "revise");
        assert_eq!(json["step"], 2);
    }
}
