//! Sandbox worker
//!
//! Entry point of isolated executions: reads one request from stdin and
//! writes one result to stdout. Logging goes to stderr.

use std::path::Path;

/// Serve a single execution request
pub fn run(data_dir: &Path) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    chaos_sandbox::worker::serve(stdin.lock(), stdout.lock(), data_dir)?;
    Ok(())
}
