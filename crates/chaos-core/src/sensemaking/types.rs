//! Loop types

use crate::types::RetrievalOutcome;
use serde::{Deserialize, Serialize};

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// The sensemaker answered
    Complete,
    /// One step was requested too many times in a row
    StepAttemptsExhausted {
        /// Step that kept being requested
        step: u32,
        /// Consecutive requests, including the one that tripped the budget
        attempts: u32,
    },
    /// The turn cap was reached
    MaxIterations {
        /// Turns taken
        iterations: u32,
    },
}

impl Termination {
    /// Short description for logs and the final review
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Complete => "completed".to_string(),
            Self::StepAttemptsExhausted { step, attempts } => {
                format!("step {} was requested {} times in a row", step, attempts)
            }
            Self::MaxIterations { iterations } => {
                format!("no answer after {} turns", iterations)
            }
        }
    }
}

/// Answer produced by the loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopOutcome {
    /// Answer text; forced answers carry the best-effort label
    pub answer: String,
    /// Supporting evidence
    pub evidence: Vec<String>,
    /// Why the loop stopped
    pub termination: Termination,
    /// Sensemaker turns taken
    pub iterations: u32,
}

impl LoopOutcome {
    /// Whether the answer was forced
    #[must_use]
    pub fn best_effort(&self) -> bool {
        self.termination != Termination::Complete
    }
}

/// Result of the retry layer
#[derive(Debug, Clone, PartialEq)]
pub struct SeekOutcome {
    /// Last outcome (the successful one, or the last failure)
    pub outcome: RetrievalOutcome,
    /// Info seeker calls made
    pub attempts: u32,
    /// Every attempt failed
    pub retries_exhausted: bool,
}

/// Counts consecutive requests of the same step
///
/// The first request of a step counts as zero repeats; the counter starts
/// over whenever a different step is requested or a correction resets the
/// step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptTracker {
    step: Option<u32>,
    repeats: u32,
}

impl AttemptTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request for `step` and return its repeat count
    pub fn observe(&mut self, step: u32) -> u32 {
        if self.step == Some(step) {
            self.repeats += 1;
        } else {
            self.step = Some(step);
            self.repeats = 0;
        }
        self.repeats
    }

    /// Zero the counter for `step`
    pub fn restart(&mut self, step: u32) {
        self.step = Some(step);
        self.repeats = 0;
    }

    /// Step seen last
    #[must_use]
    pub fn step(&self) -> Option<u32> {
        self.step
    }

    /// Current repeat count
    #[must_use]
    pub fn repeats(&self) -> u32 {
        self.repeats
    }
}
