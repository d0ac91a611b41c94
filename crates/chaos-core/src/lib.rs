//! CHAOS Core - Plan-execution engine
//!
//! This crate provides the engine of the data assistant, including:
//! - Plan: step-wise analysis plans and human edits
//! - State: per-step state and the append-only execution history
//! - Sensemaking: the turn loop with retries, corrections and budgets
//! - Agents: planner, sensemaker, info seeker and verifier contracts with
//!   LLM-backed implementations
//! - Approval: human checkpoints behind an async trait
//! - Orchestrator: one question from plan to accepted answer
//! - Events: structured progress log

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agents;
pub mod approval;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod plan;
pub mod sensemaking;
pub mod state;
pub mod types;

pub use agents::{
    InfoSeeker, LlmInfoSeeker, LlmPlanner, LlmSensemaker, LlmSettings, LlmVerifier, Planner,
    Sensemaker, Verifier,
};
pub use approval::{
    ApprovalGate, AutoApprove, CorrectionDecision, CorrectionRequest, FinalDecision,
    FinalReviewRequest, PlanDecision, StepSummary,
};
pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
pub use events::{Event, EventLevel, EventSink};
pub use orchestrator::{Orchestrator, OrchestratorConfig, RunResult, RunStatus};
pub use plan::{Plan, PlanStep, StepEdit};
pub use sensemaking::{LoopConfig, LoopOutcome, SensemakingLoop, Termination, BEST_EFFORT_LABEL};
pub use state::{ExecutionRecord, ExecutionState, RecordKind, StepState, StepStatus};
pub use types::{
    ErrorAttempt, FinalAnswer, PreviousResult, QueryDecision, Recommendation, RecoveryGuidance,
    RetrievalOutcome, SeekContext, SensemakerResponse, Verification,
};
