//! Worker side of the isolated execution protocol
//!
//! A worker reads exactly one [`ExecutionRequest`] as JSON, loads every
//! dataset under its data directory, runs the snippet and writes one
//! [`ExecutionResult`] as JSON. Failures are reported inside the result;
//! the process only exits non-zero when it cannot write its answer.

use crate::error::{Error, Result};
use crate::interp;
use crate::output::{ExecutionRequest, ExecutionResult};
use crate::table::load_datasets;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Handle one raw request
#[must_use]
pub fn handle_request(raw: &str, data_dir: &Path) -> ExecutionResult {
    match run(raw, data_dir) {
        Ok(result) => result,
        Err(e) => ExecutionResult::from_error(&e),
    }
}

fn run(raw: &str, data_dir: &Path) -> Result<ExecutionResult> {
    let request: ExecutionRequest =
        serde_json::from_str(raw).map_err(|e| Error::InvalidInput(e.to_string()))?;
    if request.code.trim().is_empty() {
        return Err(Error::EmptyCode);
    }

    let datasets = load_datasets(data_dir)?;
    let primary = match datasets.get(&request.primary_source) {
        Some(table) => Arc::clone(table),
        None => {
            let (name, table) = datasets
                .iter()
                .next()
                .ok_or_else(|| Error::NoDatasets(data_dir.display().to_string()))?;
            warn!(
                requested = %request.primary_source,
                fallback = %name,
                "Primary dataset not found, using the first dataset"
            );
            Arc::clone(table)
        }
    };

    Ok(interp::run_snippet(&request.code, primary, &datasets, request.params()).into())
}

/// Serve one request from `input`, writing the answer to `output`
pub fn serve(mut input: impl Read, mut output: impl Write, data_dir: &Path) -> Result<()> {
    let mut raw = String::new();
    let result = match input.read_to_string(&mut raw) {
        Ok(_) => handle_request(&raw, data_dir),
        Err(e) => ExecutionResult::from_error(&Error::InvalidInput(e.to_string())),
    };
    let body = serde_json::to_string(&result).map_err(|e| Error::InvalidResponse(e.to_string()))?;
    writeln!(output, "{}", body)?;
    output.flush()?;
    Ok(())
}
