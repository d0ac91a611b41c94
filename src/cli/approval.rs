//! Terminal approval gate
//!
//! Renders each checkpoint and asks with `inquire`. Prompts block, so they
//! run on the blocking pool while the engine awaits the decision.

use super::prompts;
use chaos_core::{
    ApprovalGate, CorrectionDecision, CorrectionRequest, Error, FinalDecision, FinalReviewRequest,
    Plan, PlanDecision, Result, StepEdit,
};

/// Approval gate that asks on the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalApprovalGate;

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Collaborator(format!("prompt task failed: {}", e)))?
}

fn show_plan(plan: &Plan) {
    println!("\n📋 Proposed plan");
    if !plan.query_understanding.is_empty() {
        println!("   {}", plan.query_understanding);
    }
    for line in plan.format_steps().lines() {
        println!("   {}", line);
    }
    println!();
}

fn ask_plan(plan: &Plan) -> Result<PlanDecision> {
    show_plan(plan);
    let choice = prompts::select(
        "What should happen with this plan?",
        &["Approve", "Modify steps", "Reject", "Cancel"],
    )?;
    match choice {
        0 => Ok(PlanDecision::Approve),
        1 => {
            let mut edits = Vec::new();
            loop {
                let step = prompts::step_number("Step to edit:")?;
                let current = plan.step(step).map(|s| s.action.as_str());
                if current.is_none() {
                    println!("  Step {} is not part of the plan", step);
                    continue;
                }
                let action = prompts::text("New action:", current)?;
                edits.push(StepEdit { step, action });
                if !prompts::confirm("Edit another step?", false)? {
                    break;
                }
            }
            Ok(PlanDecision::Modify(edits))
        }
        2 => Ok(PlanDecision::Reject),
        _ => Ok(PlanDecision::Cancel),
    }
}

fn ask_correction(request: &CorrectionRequest) -> Result<CorrectionDecision> {
    println!("\n🔍 Step {} needs review", request.affected_step);
    println!("   Issue: {}", request.issue);
    println!("   Proposed fix: {}", request.proposed_fix);
    if !request.reasoning.is_empty() {
        println!("   Reasoning: {}", request.reasoning);
    }
    println!();

    let choice = prompts::select(
        "How should the result be corrected?",
        &[
            "Apply the proposed fix",
            "Write a different request",
            "Keep the original result",
            "Cancel",
        ],
    )?;
    match choice {
        0 => Ok(CorrectionDecision::Approve),
        1 => Ok(CorrectionDecision::Modify(prompts::text(
            "Corrected request:",
            Some(&request.proposed_fix),
        )?)),
        2 => Ok(CorrectionDecision::Skip),
        _ => Ok(CorrectionDecision::Cancel),
    }
}

fn show_final(review: &FinalReviewRequest) {
    println!("\n💡 Answer");
    println!("{}", review.answer);
    if !review.evidence.is_empty() {
        println!("\nEvidence:");
        for item in &review.evidence {
            println!("  • {}", item);
        }
    }

    println!("\nSteps:");
    for step in &review.steps {
        let marker = if step.success { "✅" } else { "❌" };
        println!("  {} {}. {}", marker, step.step, step.action);
        println!("     {}", super::ask::preview(&step.result, 200));
    }

    let v = &review.verification;
    println!(
        "\nVerification: {} (confidence {:.0}%)",
        v.recommendation.as_str(),
        v.confidence_score * 100.0
    );
    if !v.summary.is_empty() {
        println!("  {}", v.summary);
    }
    for gap in &v.gaps {
        println!("  gap: {}", gap);
    }
    for issue in &v.issues {
        println!("  issue: {}", issue);
    }
    if review.best_effort {
        println!("\n⚠️  The analysis stopped early; this is a best-effort answer.");
    }
    println!();
}

fn ask_final(review: &FinalReviewRequest) -> Result<FinalDecision> {
    show_final(review);
    let choice = prompts::select(
        "Accept this answer?",
        &[
            "Accept",
            "Reject",
            "Revise a step",
            "Add a step",
            "Make a new plan",
            "Cancel",
        ],
    )?;
    match choice {
        0 => Ok(FinalDecision::Accept),
        1 => Ok(FinalDecision::Reject),
        2 => {
            let step = prompts::step_number("Step to revise:")?;
            let request = prompts::text("Revised request:", None)?;
            Ok(FinalDecision::Revise { step, request })
        }
        3 => Ok(FinalDecision::AddStep {
            action: prompts::text("New step:", None)?,
        }),
        4 => {
            let feedback = prompts::text("What should the new plan do differently? (optional)", None)?;
            Ok(FinalDecision::Replan {
                feedback: Some(feedback).filter(|f| !f.is_empty()),
            })
        }
        _ => Ok(FinalDecision::Cancel),
    }
}

#[async_trait::async_trait]
impl ApprovalGate for TerminalApprovalGate {
    async fn review_plan(&self, plan: &Plan) -> Result<PlanDecision> {
        let plan = plan.clone();
        blocking(move || ask_plan(&plan)).await
    }

    async fn review_correction(&self, request: &CorrectionRequest) -> Result<CorrectionDecision> {
        let request = request.clone();
        blocking(move || ask_correction(&request)).await
    }

    async fn final_review(&self, review: &FinalReviewRequest) -> Result<FinalDecision> {
        let review = review.clone();
        blocking(move || ask_final(&review)).await
    }
}
