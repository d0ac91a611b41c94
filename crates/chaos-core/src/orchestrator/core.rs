//! Orchestrator core structure
//!
//! Contains the main `Orchestrator` struct and its builder methods.

use crate::agents::{
    InfoSeeker, LlmInfoSeeker, LlmPlanner, LlmSensemaker, LlmSettings, LlmVerifier, Planner,
    Sensemaker, Verifier,
};
use crate::approval::ApprovalGate;
use crate::events::EventSink;
use crate::sensemaking::SensemakingLoop;
use crate::state::ExecutionState;
use chaos_data::DataRegistry;
use chaos_llm::LlmProvider;
use std::sync::Arc;
use tracing::info;

use super::config::OrchestratorConfig;

/// Main orchestrator that coordinates one question at a time
pub struct Orchestrator {
    pub(crate) planner: Arc<dyn Planner>,
    pub(crate) verifier: Arc<dyn Verifier>,
    pub(crate) approval: Arc<dyn ApprovalGate>,
    pub(crate) registry: Arc<DataRegistry>,
    pub(crate) engine: SensemakingLoop,
    pub(crate) events: EventSink,
    pub(crate) config: OrchestratorConfig,
    pub(crate) state: ExecutionState,
}

impl Orchestrator {
    /// Create a new orchestrator from its collaborators
    #[must_use]
    pub fn new(
        planner: Arc<dyn Planner>,
        sensemaker: Arc<dyn Sensemaker>,
        info_seeker: Arc<dyn InfoSeeker>,
        verifier: Arc<dyn Verifier>,
        approval: Arc<dyn ApprovalGate>,
        registry: Arc<DataRegistry>,
    ) -> Self {
        let config = OrchestratorConfig::default();
        let events = EventSink::default();
        let engine = SensemakingLoop::new(sensemaker, info_seeker, Arc::clone(&approval))
            .with_config(config.loop_config)
            .with_events(events.clone());

        Self {
            planner,
            verifier,
            approval,
            registry,
            engine,
            events,
            config,
            state: ExecutionState::new(),
        }
    }

    /// Create an orchestrator whose collaborators all use one LLM provider
    #[must_use]
    pub fn with_llm(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<DataRegistry>,
        approval: Arc<dyn ApprovalGate>,
        settings: LlmSettings,
    ) -> Self {
        info!(provider = provider.name(), sources = registry.len(), "Creating orchestrator");
        Self::new(
            Arc::new(LlmPlanner::new(Arc::clone(&provider), settings.clone())),
            Arc::new(LlmSensemaker::new(Arc::clone(&provider), settings.clone())),
            Arc::new(LlmInfoSeeker::new(
                Arc::clone(&provider),
                Arc::clone(&registry),
                settings.clone(),
            )),
            Arc::new(LlmVerifier::new(provider, settings)),
            approval,
            registry,
        )
    }

    /// Set the configuration
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.engine.config = config.loop_config;
        self.config = config;
        self
    }

    /// Use a shared event sink
    #[must_use]
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.engine.events = events.clone();
        self.events = events;
        self
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Event sink
    #[must_use]
    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// Execution state of the latest run
    #[must_use]
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Data registry
    #[must_use]
    pub fn registry(&self) -> &Arc<DataRegistry> {
        &self.registry
    }
}
