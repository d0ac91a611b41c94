//! CHAOS - Conversational data analysis
//!
//! CLI entry point: plans an analysis, runs it against local CSV datasets
//! and checks the answer with the user.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod cli;

const CRATES: [&str; 5] = ["chaos", "chaos_core", "chaos_data", "chaos_llm", "chaos_sandbox"];

fn default_filter(level: &str) -> String {
    CRATES
        .iter()
        .map(|c| format!("{}={}", c, level))
        .collect::<Vec<_>>()
        .join(",")
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        app::load_config()
            .map(|c| c.log.level)
            .unwrap_or_else(|_| "warn".to_string())
    };

    // stdout carries worker results and JSON output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(&level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!("Starting CHAOS v{}", env!("CARGO_PKG_VERSION"));

    cli::run(cli).await
}
