//! Execution state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of one plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not executed yet
    #[default]
    Pending,
    /// Executed successfully
    Completed,
    /// A result was flagged as suspicious
    NeedsReview,
    /// Execution failed
    Failed,
}

impl StepStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::NeedsReview => "needs_review",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of one plan step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    /// Step number
    pub step: u32,
    /// Status
    pub status: StepStatus,
    /// Result of the latest successful execution
    pub result: Option<String>,
    /// Error of the latest failed execution
    pub error: Option<String>,
    /// Why the step was flagged for review
    pub review_note: Option<String>,
    /// The human kept this result despite a review
    pub user_accepted: bool,
}

impl StepState {
    /// A completed step
    #[must_use]
    pub fn completed(step: u32, result: Option<String>) -> Self {
        Self {
            step,
            status: StepStatus::Completed,
            result,
            error: None,
            review_note: None,
            user_accepted: false,
        }
    }

    /// A failed step
    #[must_use]
    pub fn failed(step: u32, error: impl Into<String>) -> Self {
        Self {
            step,
            status: StepStatus::Failed,
            result: None,
            error: Some(error.into()),
            review_note: None,
            user_accepted: false,
        }
    }

    /// A completed step whose result the human explicitly kept
    #[must_use]
    pub fn accepted(step: u32, result: Option<String>) -> Self {
        Self {
            user_accepted: true,
            ..Self::completed(step, result)
        }
    }

    /// Result or error text, whichever is set
    #[must_use]
    pub fn outcome_text(&self) -> Option<&str> {
        self.result.as_deref().or(self.error.as_deref())
    }
}

/// What an execution record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A snippet execution
    #[default]
    Execution,
    /// A note about the run (corrections, human decisions)
    Context,
}

/// Immutable audit entry for one execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Step the attempt belongs to
    pub step: u32,
    /// Entry kind
    #[serde(default)]
    pub kind: RecordKind,
    /// Executed snippet (empty for context notes)
    pub code: String,
    /// Result on success, or the note text for context entries
    pub result: Option<String>,
    /// Whether the execution succeeded
    pub success: bool,
    /// Error on failure
    pub error: Option<String>,
    /// When the entry was appended
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Whether this entry is a snippet execution
    #[must_use]
    pub fn is_execution(&self) -> bool {
        self.kind == RecordKind::Execution
    }

    /// Result or error text, whichever is set
    #[must_use]
    pub fn outcome_text(&self) -> &str {
        self.result
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("")
    }
}
