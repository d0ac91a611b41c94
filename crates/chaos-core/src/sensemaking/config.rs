//! Loop budgets

use serde::{Deserialize, Serialize};

/// Budgets of the sensemaking loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Info seeker calls per retrieval request
    pub max_retries: u32,
    /// Consecutive repeat requests of one step before the loop gives up
    pub max_step_attempts: u32,
    /// Hard cap on sensemaker turns
    pub max_iterations: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_step_attempts: 5,
            max_iterations: 50,
        }
    }
}

impl LoopConfig {
    /// Create a configuration with default budgets
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry budget
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the per-step attempt budget
    #[must_use]
    pub fn with_max_step_attempts(mut self, max_step_attempts: u32) -> Self {
        self.max_step_attempts = max_step_attempts;
        self
    }

    /// Set the turn cap
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}
