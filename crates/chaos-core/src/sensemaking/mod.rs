//! Sensemaking - the turn loop that drives a plan to an answer
//!
//! Each turn the sensemaker looks at the plan and the execution history and
//! either answers, asks for a retrieval, or flags a suspicious result.
//!
//! # Module Structure
//!
//! - `config`: loop budgets
//! - `types`: loop outcome, termination reason, attempt tracker
//! - `core`: `SensemakingLoop` and the turn loop
//! - `retry`: retrieval with error history and recovery guidance
//! - `correction`: human review of suspicious results
//! - `fallback`: forced best-effort answers

mod config;
mod core;
mod correction;
mod fallback;
mod retry;
mod types;

#[cfg(test)]
mod tests;

pub(crate) use core::previous_results;
pub use config::LoopConfig;
pub use core::SensemakingLoop;
pub use fallback::BEST_EFFORT_LABEL;
pub use types::{AttemptTracker, LoopOutcome, SeekOutcome, Termination};
