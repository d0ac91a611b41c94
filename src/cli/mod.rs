//! CLI module for CHAOS
//!
//! Provides interactive commands:
//! - `ask`: answer one question about the datasets
//! - `datasets`: list discovered datasets
//! - `doctor`: System diagnostics and health checks
//! - `worker`: sandbox worker entry point (used by isolated execution)
//!
//! Without a subcommand an interactive session starts.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod approval;
pub mod ask;
pub mod datasets;
pub mod doctor;
pub mod prompts;
pub mod worker;

/// CHAOS conversational data analysis
#[derive(Parser, Debug)]
#[command(name = "chaos")]
#[command(about = "Ask questions about your CSV datasets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Datasets directory (overrides configuration)
    #[arg(long, global = true)]
    pub datasets_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer one question and exit
    Ask {
        /// The question
        query: String,
        /// Approve every checkpoint automatically
        #[arg(short, long)]
        yes: bool,
        /// Print the run result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List discovered datasets
    Datasets,
    /// Run system diagnostics
    Doctor,
    /// Serve one sandbox execution over stdin/stdout
    #[command(hide = true)]
    Worker {
        /// Directory holding the CSV datasets
        #[arg(long)]
        data_dir: PathBuf,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Ask { query, yes, json }) => {
            let options = ask::AskOptions {
                datasets_dir: cli.datasets_dir,
                yes,
                json,
            };
            ask::ask(&query, options).await
        }
        Some(Commands::Datasets) => datasets::run(cli.datasets_dir).await,
        Some(Commands::Doctor) => doctor::run().await,
        Some(Commands::Worker { data_dir }) => worker::run(&data_dir),
        None => {
            ask::repl(ask::AskOptions {
                datasets_dir: cli.datasets_dir,
                ..ask::AskOptions::default()
            })
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["chaos", "ask", "What is the mean?", "--yes"]).unwrap();
        match cli.command {
            Some(Commands::Ask { query, yes, json }) => {
                assert_eq!(query, "What is the mean?");
                assert!(yes);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["chaos", "datasets", "--datasets-dir", "/data", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.datasets_dir, Some(PathBuf::from("/data")));
        assert!(matches!(cli.command, Some(Commands::Datasets)));
    }

    #[test]
    fn test_parse_worker_and_default() {
        let cli = Cli::try_parse_from(["chaos", "worker", "--data-dir", "/data"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Worker { .. })));
        let cli = Cli::try_parse_from(["chaos"]).unwrap();
        assert!(cli.command.is_none());
    }
}
