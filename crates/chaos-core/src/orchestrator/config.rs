//! Orchestrator configuration

use crate::sensemaking::LoopConfig;
use serde::{Deserialize, Serialize};

/// Configuration for the orchestrator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Budgets of the sensemaking loop
    pub loop_config: LoopConfig,
    /// Skip the verifier
    pub skip_verification: bool,
}

impl OrchestratorConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the loop budgets
    #[must_use]
    pub fn with_loop_config(mut self, loop_config: LoopConfig) -> Self {
        self.loop_config = loop_config;
        self
    }

    /// Enable or disable verification
    #[must_use]
    pub fn with_verification(mut self, enabled: bool) -> Self {
        self.skip_verification = !enabled;
        self
    }
}
