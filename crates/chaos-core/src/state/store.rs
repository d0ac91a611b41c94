//! ExecutionState ledger

use super::types::{ExecutionRecord, RecordKind, StepState, StepStatus};
use crate::error::{Error, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::debug;

const FAILED_WITHOUT_MESSAGE: &str = "Execution failed without an error message";

/// Per-step state and execution history of one query
///
/// Owned by the sensemaking loop; there is no concurrent writer. Records
/// are only ever appended, and step states are projections of them plus
/// the explicit overrides made by the correction flow.
#[derive(Debug, Clone, Default)]
pub struct ExecutionState {
    current_step: u32,
    step_states: BTreeMap<u32, StepState>,
    records: Vec<ExecutionRecord>,
}

impl ExecutionState {
    /// Create an empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest step executed so far (0 before the first execution)
    #[must_use]
    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    /// All step states, ordered by step
    #[must_use]
    pub fn step_states(&self) -> &BTreeMap<u32, StepState> {
        &self.step_states
    }

    /// Record one execution attempt
    ///
    /// Appends a record and sets the step to `completed` or `failed`. A
    /// success keeps only the result, a failure only the error.
    pub fn record_result(
        &mut self,
        step: u32,
        code: impl Into<String>,
        result: Option<String>,
        success: bool,
        error: Option<String>,
    ) {
        let (result, error) = if success {
            (result, None)
        } else {
            (
                None,
                Some(error.unwrap_or_else(|| FAILED_WITHOUT_MESSAGE.to_string())),
            )
        };

        self.records.push(ExecutionRecord {
            step,
            kind: RecordKind::Execution,
            code: code.into(),
            result: result.clone(),
            success,
            error: error.clone(),
            recorded_at: Utc::now(),
        });

        let state = match error {
            Some(error) => StepState::failed(step, error),
            None => StepState::completed(step, result),
        };
        debug!(step, status = %state.status, records = self.records.len(), "Recorded step result");
        self.step_states.insert(step, state);
        self.current_step = self.current_step.max(step);
    }

    /// Append a context note for `step`
    pub fn record_context(&mut self, step: u32, note: impl Into<String>) {
        self.records.push(ExecutionRecord {
            step,
            kind: RecordKind::Context,
            code: String::new(),
            result: Some(note.into()),
            success: true,
            error: None,
            recorded_at: Utc::now(),
        });
    }

    /// State of one step; `None` means pending
    #[must_use]
    pub fn get_step_state(&self, step: u32) -> Option<&StepState> {
        self.step_states.get(&step)
    }

    /// Status of one step
    #[must_use]
    pub fn status(&self, step: u32) -> StepStatus {
        self.step_states
            .get(&step)
            .map(|s| s.status)
            .unwrap_or_default()
    }

    /// Replace the state of a step
    ///
    /// The state must describe `step`. Completed and failed states move the
    /// current-step pointer forward like a recorded result does.
    pub fn set_step_state(&mut self, step: u32, state: StepState) -> Result<()> {
        if step == 0 {
            return Err(Error::State("step numbers start at 1".to_string()));
        }
        if state.step != step {
            return Err(Error::State(format!(
                "state for step {} cannot be stored under step {}",
                state.step, step
            )));
        }
        if matches!(state.status, StepStatus::Completed | StepStatus::Failed) {
            self.current_step = self.current_step.max(step);
        }
        self.step_states.insert(step, state);
        Ok(())
    }

    /// Flag a step for review, keeping its result
    pub fn mark_needs_review(&mut self, step: u32, note: impl Into<String>) {
        let entry = self.step_states.entry(step).or_insert_with(|| StepState {
            step,
            status: StepStatus::Pending,
            result: None,
            error: None,
            review_note: None,
            user_accepted: false,
        });
        entry.status = StepStatus::NeedsReview;
        entry.review_note = Some(note.into());
        entry.user_accepted = false;
    }

    /// Return a step to pending so it is executed again
    ///
    /// Rewinds the current-step pointer to `step - 1` when it is at or
    /// past `step`. Records are kept.
    pub fn reset_step(&mut self, step: u32) {
        self.step_states.remove(&step);
        if self.current_step >= step {
            self.current_step = step.saturating_sub(1);
        }
        debug!(step, current = self.current_step, "Reset step");
    }

    /// Clear everything for a fresh query
    pub fn reset(&mut self) {
        self.current_step = 0;
        self.step_states.clear();
        self.records.clear();
    }

    /// Borrowed view of the history
    #[must_use]
    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    /// Snapshot of the history
    #[must_use]
    pub fn export(&self) -> Vec<ExecutionRecord> {
        self.records.clone()
    }

    /// Records of one step, oldest first
    #[must_use]
    pub fn records_for(&self, step: u32) -> Vec<&ExecutionRecord> {
        self.records.iter().filter(|r| r.step == step).collect()
    }

    /// Latest execution record of a step
    #[must_use]
    pub fn latest_execution(&self, step: u32) -> Option<&ExecutionRecord> {
        self.records
            .iter()
            .rev()
            .find(|r| r.step == step && r.is_execution())
    }

    /// Step state derived from the latest execution record alone
    #[must_use]
    pub fn project_step(&self, step: u32) -> Option<StepState> {
        self.latest_execution(step).map(|r| match &r.error {
            Some(error) if !r.success => StepState::failed(step, error.clone()),
            _ => StepState::completed(step, r.result.clone()),
        })
    }

    /// Render the latest entries for a prompt
    #[must_use]
    pub fn context_for_llm(&self, max_entries: usize) -> String {
        if self.records.is_empty() {
            return "No code executed yet.".to_string();
        }

        let skip = self.records.len().saturating_sub(max_entries);
        let mut lines = vec!["Previous executions:".to_string()];
        for record in &self.records[skip..] {
            match record.kind {
                RecordKind::Context => {
                    lines.push(format!("\nStep {} (note): {}", record.step, record.outcome_text()));
                }
                RecordKind::Execution => {
                    lines.push(format!("\nStep {}: Code:\n```\n{}\n```", record.step, record.code));
                    if record.success {
                        lines.push(format!("Result: {}", record.outcome_text()));
                    } else {
                        lines.push(format!("Error: {}", record.outcome_text()));
                    }
                }
            }
        }
        lines.join("\n")
    }
}
