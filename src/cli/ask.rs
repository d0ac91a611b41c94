//! Ask command and interactive session
//!
//! Builds an orchestrator over the datasets directory, streams progress
//! events to stderr while a run is in flight and renders the final result.

use super::approval::TerminalApprovalGate;
use super::prompts;
use crate::app::{init, load_config, AppConfig};
use anyhow::Result;
use chaos_core::{
    format_error_for_cli, ApprovalGate, AutoApprove, Error, EventLevel, Orchestrator, RunResult,
    RunStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Options shared by `ask` and the interactive session
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Overrides the configured datasets directory
    pub datasets_dir: Option<PathBuf>,
    /// Approve every checkpoint automatically
    pub yes: bool,
    /// Print the run result as JSON
    pub json: bool,
}

/// First `max` characters of `text` on one line
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        format!("{}...", flat.chars().take(max).collect::<String>())
    }
}

fn datasets_dir(config: &AppConfig, options: &AskOptions) -> PathBuf {
    options
        .datasets_dir
        .clone()
        .unwrap_or_else(|| config.data.datasets_dir.clone())
}

async fn build(options: &AskOptions) -> Result<Orchestrator> {
    let config = load_config()?;
    let dir = datasets_dir(&config, options);
    let approval: Arc<dyn ApprovalGate> = if options.yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(TerminalApprovalGate)
    };
    init::init_orchestrator(&config, &dir, approval).await
}

/// Print progress events until the sink is dropped
fn follow_events(orchestrator: &Orchestrator) -> JoinHandle<()> {
    let mut rx = orchestrator.events().subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let marker = match event.level {
                        EventLevel::Debug => continue,
                        EventLevel::Info => "·",
                        EventLevel::Warn => "⚠",
                        EventLevel::Error => "✗",
                    };
                    eprintln!("  {} [{}] {}", marker, event.component, event.message);
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn render(result: &RunResult) {
    match result.status {
        RunStatus::Accepted => {
            println!("\n✅ {}", result.answer);
            for item in &result.evidence {
                println!("  • {}", item);
            }
            if let Some(termination) = &result.termination {
                if result.best_effort {
                    println!("\n⚠️  {}", termination.describe());
                }
            }
        }
        RunStatus::Rejected => println!("\n❌ Run rejected."),
        RunStatus::Cancelled => println!("\n✋ Run cancelled."),
    }
    println!(
        "   ({} executions, {:.1}s)",
        result.records.iter().filter(|r| r.is_execution()).count(),
        result.duration_ms as f64 / 1000.0
    );
}

async fn run_query(orchestrator: &mut Orchestrator, query: &str, json: bool) -> Result<bool> {
    let follower = (!json).then(|| follow_events(orchestrator));
    let outcome = orchestrator.run(query).await;
    if let Some(handle) = follower {
        handle.abort();
    }

    match outcome {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                render(&result);
            }
            Ok(result.status == RunStatus::Accepted)
        }
        Err(e) => {
            eprintln!("{}", format_error_for_cli(&e));
            Ok(false)
        }
    }
}

/// Answer one question and exit
pub async fn ask(query: &str, options: AskOptions) -> Result<()> {
    let mut orchestrator = build(&options).await?;
    let accepted = run_query(&mut orchestrator, query, options.json).await?;
    orchestrator.registry().disconnect_all().await;
    if !accepted {
        std::process::exit(1);
    }
    Ok(())
}

/// Interactive session: one question after another until `exit`
pub async fn repl(options: AskOptions) -> Result<()> {
    let mut orchestrator = build(&options).await?;
    let names = orchestrator.registry().names();
    println!("🔎 CHAOS v{}", env!("CARGO_PKG_VERSION"));
    if names.is_empty() {
        println!("No datasets found. Put CSV files under the datasets directory.");
    } else {
        println!("Datasets: {}", names.join(", "));
    }
    println!("Type a question, or `exit` to quit.\n");

    loop {
        let query = match tokio::task::spawn_blocking(|| prompts::text("Question:", None)).await? {
            Ok(q) => q,
            Err(Error::Cancelled) => break,
            Err(e) => return Err(e.into()),
        };
        match query.as_str() {
            "" => continue,
            "exit" | "quit" => break,
            _ => {
                run_query(&mut orchestrator, &query, options.json).await?;
                println!();
            }
        }
    }

    orchestrator.registry().disconnect_all().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("a\nb", 10), "a b");
        assert_eq!(preview("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_datasets_dir_override() {
        let config = AppConfig::default();
        let options = AskOptions {
            datasets_dir: Some(PathBuf::from("/tmp/data")),
            ..AskOptions::default()
        };
        assert_eq!(datasets_dir(&config, &options), PathBuf::from("/tmp/data"));
        assert_eq!(
            datasets_dir(&config, &AskOptions::default()),
            config.data.datasets_dir
        );
    }
}
