//! Orchestrator - One question from plan to accepted answer
//!
//! Wraps the sensemaking loop with the human checkpoints around it: plan
//! approval before the loop, verification and final review after it.
//!
//! # Module Structure
//!
//! - `types`: run result and status
//! - `config`: orchestrator settings
//! - `core`: `Orchestrator` struct and builder methods
//! - `process`: planning, plan approval and the main run
//! - `review`: final review actions (revise, add step, replan)

mod config;
mod core;
mod process;
mod review;
mod types;

#[cfg(test)]
mod tests;

pub use config::OrchestratorConfig;
pub use core::Orchestrator;
pub use types::{RunResult, RunStatus, EMPTY_PLAN_ANSWER};
