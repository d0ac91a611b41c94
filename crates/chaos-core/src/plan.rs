//! Plan - Step-wise analysis plans
//!
//! A plan is produced by the planner, reviewed by the human and then
//! driven to completion by the sensemaking loop. Steps are identified by
//! their number, which is unique and starts at 1.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Single step in an execution plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step number (1-based)
    pub step: u32,
    /// What the step computes
    pub action: String,
    /// Dataset the step reads from
    #[serde(default)]
    pub source: String,
    /// The human overrode this step; its action is used verbatim
    #[serde(default)]
    pub modified: bool,
}

impl PlanStep {
    /// Create a step
    #[must_use]
    pub fn new(step: u32, action: impl Into<String>) -> Self {
        Self {
            step,
            action: action.into(),
            source: String::new(),
            modified: false,
        }
    }

    /// Set the source dataset
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Mark the step as a human override
    #[must_use]
    pub fn modified(mut self) -> Self {
        self.modified = true;
        self
    }
}

/// A human edit of one plan step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEdit {
    /// Step to edit
    pub step: u32,
    /// Replacement action
    pub action: String,
}

/// Execution plan from the planner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// The user's question
    #[serde(default)]
    pub query: String,
    /// The planner's reading of the question
    #[serde(default)]
    pub query_understanding: String,
    /// Facts needed to answer
    #[serde(default)]
    pub required_info: Vec<String>,
    /// Datasets the plan uses
    #[serde(default)]
    pub data_sources: Vec<String>,
    /// Ordered steps
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    /// How to tell the question is answered
    #[serde(default)]
    pub success_criteria: Vec<String>,
}

impl Plan {
    /// Create a plan for `query` with the given steps
    #[must_use]
    pub fn new(query: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self {
            query: query.into(),
            steps,
            ..Self::default()
        }
    }

    /// Check step numbering and actions
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for step in &self.steps {
            if step.step == 0 {
                return Err(Error::InvalidPlan("step numbers start at 1".to_string()));
            }
            if !seen.insert(step.step) {
                return Err(Error::InvalidPlan(format!("duplicate step {}", step.step)));
            }
            if step.action.trim().is_empty() {
                return Err(Error::InvalidPlan(format!("step {} has no action", step.step)));
            }
        }
        Ok(())
    }

    /// Whether the plan has no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Look up a step by number
    #[must_use]
    pub fn step(&self, number: u32) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.step == number)
    }

    /// Number for a step appended after every existing one
    #[must_use]
    pub fn next_step_number(&self) -> u32 {
        self.steps.iter().map(|s| s.step).max().unwrap_or(0) + 1
    }

    /// Append a human-written step and return its number
    pub fn push_user_step(&mut self, action: impl Into<String>) -> u32 {
        let number = self.next_step_number();
        self.steps.push(PlanStep::new(number, action).modified());
        number
    }

    /// Apply human edits; unchanged or blank actions are ignored
    ///
    /// Returns the number of steps that changed.
    pub fn apply_edits(&mut self, edits: &[StepEdit]) -> usize {
        let mut changed = 0;
        for edit in edits {
            let action = edit.action.trim();
            if action.is_empty() {
                continue;
            }
            if let Some(step) = self.steps.iter_mut().find(|s| s.step == edit.step) {
                if step.action != action {
                    step.action = action.to_string();
                    step.modified = true;
                    changed += 1;
                }
            }
        }
        changed
    }

    /// One line per step, for prompts and display
    #[must_use]
    pub fn format_steps(&self) -> String {
        if self.steps.is_empty() {
            return "(no steps)".to_string();
        }
        self.steps
            .iter()
            .map(|s| {
                let mut line = format!("{}. {}", s.step, s.action);
                if !s.source.is_empty() {
                    line.push_str(&format!(" [source: {}]", s.source));
                }
                if s.modified {
                    line.push_str(" [user-modified]");
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Plan {
        Plan::new(
            "average heart rate?",
            vec![
                PlanStep::new(1, "Compute mean of bpm").with_source("heart_rate"),
                PlanStep::new(2, "Compare with resting rate"),
            ],
        )
    }

    #[test]
    fn test_validate() {
        assert!(plan().validate().is_ok());
        assert!(Plan::default().validate().is_ok());

        let mut dup = plan();
        dup.steps[1].step = 1;
        assert!(matches!(dup.validate(), Err(Error::InvalidPlan(m)) if m.contains("duplicate")));

        let mut zero = plan();
        zero.steps[0].step = 0;
        assert!(zero.validate().is_err());

        let mut blank = plan();
        blank.steps[1].action = "  ".to_string();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_apply_edits_marks_modified() {
        let mut p = plan();
        let changed = p.apply_edits(&[
            StepEdit {
                step: 1,
                action: "Compute median of bpm".to_string(),
            },
            StepEdit {
                step: 2,
                action: "Compare with resting rate".to_string(),
            },
            StepEdit {
                step: 9,
                action: "ignored".to_string(),
            },
        ]);
        assert_eq!(changed, 1);
        assert!(p.steps[0].modified);
        assert_eq!(p.steps[0].action, "Compute median of bpm");
        assert!(!p.steps[1].modified);
    }

    #[test]
    fn test_push_user_step() {
        let mut p = plan();
        p.steps[1].step = 5;
        assert_eq!(p.push_user_step("subtract 10 from step 1 result"), 6);
        let added = p.step(6).unwrap();
        assert!(added.modified);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_format_steps() {
        let mut p = plan();
        p.steps[1].modified = true;
        assert_eq!(
            p.format_steps(),
            "1. Compute mean of bpm [source: heart_rate]\n2. Compare with resting rate [user-modified]"
        );
        assert_eq!(Plan::default().format_steps(), "(no steps)");
    }

    #[test]
    fn test_deserialize_planner_output() {
        let raw = r#"{"query_understanding": "mean bpm", "steps": [{"step": 1, "action": "mean", "source": "hr"}]}"#;
        let p: Plan = serde_json::from_str(raw).unwrap();
        assert_eq!(p.steps[0].source, "hr");
        assert!(!p.steps[0].modified);
        assert!(p.required_info.is_empty());
    }
}
