//! Orchestrator types

use crate::plan::Plan;
use crate::sensemaking::{LoopOutcome, Termination};
use crate::state::ExecutionRecord;
use crate::types::Verification;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Answer given when the approved plan has no steps
pub const EMPTY_PLAN_ANSWER: &str = "The plan has no steps, so there is nothing to compute.";

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The human accepted the answer
    Accepted,
    /// The human rejected the plan or the answer
    Rejected,
    /// The human aborted at a checkpoint
    Cancelled,
}

impl RunStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of one orchestrated question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Run ID
    pub run_id: Uuid,
    /// Final status
    pub status: RunStatus,
    /// The question
    pub query: String,
    /// Answer text (empty when no answer was produced)
    pub answer: String,
    /// Supporting evidence
    pub evidence: Vec<String>,
    /// Verifier report
    pub verification: Option<Verification>,
    /// Plan that produced the answer
    pub plan: Option<Plan>,
    /// Execution history
    pub records: Vec<ExecutionRecord>,
    /// The answer was forced
    pub best_effort: bool,
    /// Why the loop stopped
    pub termination: Option<Termination>,
    /// Run duration in milliseconds
    pub duration_ms: u64,
}

impl RunResult {
    /// A run that ended without an answer
    #[must_use]
    pub fn without_answer(
        run_id: Uuid,
        status: RunStatus,
        query: impl Into<String>,
        plan: Option<Plan>,
    ) -> Self {
        Self {
            run_id,
            status,
            query: query.into(),
            answer: String::new(),
            evidence: Vec::new(),
            verification: None,
            plan,
            records: Vec::new(),
            best_effort: false,
            termination: None,
            duration_ms: 0,
        }
    }

    /// A run that produced an answer
    #[must_use]
    pub fn answered(
        run_id: Uuid,
        status: RunStatus,
        query: impl Into<String>,
        outcome: LoopOutcome,
        verification: Option<Verification>,
        plan: Plan,
        records: Vec<ExecutionRecord>,
    ) -> Self {
        Self {
            run_id,
            status,
            query: query.into(),
            best_effort: outcome.best_effort(),
            answer: outcome.answer,
            evidence: outcome.evidence,
            verification,
            plan: Some(plan),
            records,
            termination: Some(outcome.termination),
            duration_ms: 0,
        }
    }

    /// Set the duration
    #[must_use]
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}
