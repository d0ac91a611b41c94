//! Execution State - per-step status plus an append-only record history
//!
//! - `types`: StepStatus, StepState, ExecutionRecord
//! - `store`: the ExecutionState ledger owned by the sensemaking loop

mod store;
mod types;


pub use store::ExecutionState;
pub use types::{ExecutionRecord, RecordKind, StepState, StepStatus};
