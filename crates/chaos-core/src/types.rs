//! Collaborator contract types
//!
//! The shapes the engine exchanges with the planner, sensemaker, info
//! seeker and verifier. They deserialize leniently from model output.

use chaos_data::{QueryKind, QueryParams};
use chaos_sandbox::ExecutionResult;
use serde::{Deserialize, Serialize};

/// Decision of the sensemaker for one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SensemakerResponse {
    /// The question is answered
    Complete {
        /// Final answer
        #[serde(default)]
        answer: String,
        /// Facts supporting the answer
        #[serde(default, alias = "supporting_evidence")]
        evidence: Vec<String>,
    },
    /// Run a retrieval for a plan step
    #[serde(alias = "needs_info")]
    Execute {
        /// Step being worked on
        #[serde(alias = "current_step")]
        step: u32,
        /// Natural-language retrieval request
        request: String,
        /// Why this is needed
        #[serde(default)]
        reasoning: String,
    },
    /// A previous result looks wrong and should be corrected
    #[serde(alias = "needs_correction")]
    Review {
        /// Step whose result is suspicious
        affected_step: u32,
        /// What looks wrong
        #[serde(alias = "issue_description")]
        issue: String,
        /// Retrieval request that would fix it
        #[serde(alias = "proposed_correction")]
        proposed_fix: String,
        /// Why the fix is proposed
        #[serde(default)]
        reasoning: String,
    },
}

/// Which dataset to query and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDecision {
    /// Dataset name
    pub source: String,
    /// Query kind
    #[serde(default, alias = "query_type")]
    pub kind: QueryKind,
    /// Query parameters; `code` holds the snippet
    #[serde(default)]
    pub params: QueryParams,
}

/// Answer of the info seeker to one retrieval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    /// Request that was served
    pub request: String,
    /// Dataset queried
    pub source: String,
    /// Query kind
    pub kind: QueryKind,
    /// Query parameters
    pub params: QueryParams,
    /// Serialized result on success
    pub result: Option<String>,
    /// Error on failure
    pub error: Option<String>,
    /// Whether the result was truncated
    pub truncated: bool,
}

impl RetrievalOutcome {
    /// Combine a query decision with its execution result
    #[must_use]
    pub fn from_execution(
        request: impl Into<String>,
        decision: QueryDecision,
        execution: ExecutionResult,
    ) -> Self {
        Self {
            request: request.into(),
            source: decision.source,
            kind: decision.kind,
            params: decision.params,
            result: execution.result,
            error: execution.error,
            truncated: execution.truncated,
        }
    }

    /// A request that could not be turned into a query
    #[must_use]
    pub fn failure(request: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            source: String::new(),
            kind: QueryKind::Exec,
            params: QueryParams::new(),
            result: None,
            error: Some(error.into()),
            truncated: false,
        }
    }

    /// Whether the retrieval succeeded
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Snippet that was run
    #[must_use]
    pub fn code(&self) -> &str {
        self.params.get("code").map(String::as_str).unwrap_or("")
    }

    /// Result or error text
    #[must_use]
    pub fn text(&self) -> &str {
        self.result
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("")
    }
}

/// One failed retrieval attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorAttempt {
    /// Attempt number (1-based)
    pub attempt: u32,
    /// Request used for the attempt
    pub request: String,
    /// Error it produced
    pub error: String,
}

/// Result of an earlier step, given to the info seeker as context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousResult {
    /// Step number
    pub step: u32,
    /// Step action
    pub action: String,
    /// Step result
    pub result: String,
}

/// Extra context for one retrieval
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekContext {
    /// Step the retrieval belongs to
    pub step: u32,
    /// Failed attempts so far, oldest first
    pub errors: Vec<ErrorAttempt>,
    /// Results of earlier steps
    pub previous_results: Vec<PreviousResult>,
}

/// Sensemaker guidance after a failed retrieval
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryGuidance {
    /// One-line summary of the failure
    pub summary: String,
    /// What went wrong
    pub analysis: String,
    /// Request to try next; empty keeps the current one
    pub revised_request: String,
    /// Advice for the retrieval
    pub guidance: String,
}

/// Answer synthesized when the loop is cut short
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalAnswer {
    /// Answer text
    pub answer: String,
    /// Supporting evidence
    #[serde(alias = "supporting_evidence")]
    pub evidence: Vec<String>,
}

/// Verifier recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Accept the answer
    Approve,
    /// Reject the answer
    Reject,
    /// A human should look closer
    #[default]
    NeedsReview,
}

impl Recommendation {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::NeedsReview => "needs_review",
        }
    }
}

/// Verifier report on a final answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Verification {
    /// Every plan step is reflected in the answer
    pub is_complete: bool,
    /// The answer matches the executed computations
    pub is_accurate: bool,
    /// Confidence in [0, 1]
    pub confidence_score: f64,
    /// Missing information
    pub gaps: Vec<String>,
    /// Problems found
    pub issues: Vec<String>,
    /// Short summary
    pub summary: String,
    /// Recommendation
    pub recommendation: Recommendation,
}

impl Verification {
    /// Report used when no verification could be obtained
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            summary: format!("Verification unavailable: {}", reason.into()),
            ..Self::default()
        }
    }

    /// Make the report self-consistent
    ///
    /// Gaps imply incomplete, issues imply inaccurate, and an incomplete or
    /// inaccurate answer cannot be approved. The score is clamped to [0, 1].
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if !self.gaps.is_empty() {
            self.is_complete = false;
        }
        if !self.issues.is_empty() {
            self.is_accurate = false;
        }
        if (!self.is_complete || !self.is_accurate) && self.recommendation == Recommendation::Approve
        {
            self.recommendation = Recommendation::NeedsReview;
        }
        self.confidence_score = if self.confidence_score.is_finite() {
            self.confidence_score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}
