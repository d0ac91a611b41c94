//! In-process execution on a blocking thread

use super::{Executor, SandboxMode};
use crate::error::{Error, Result};
use crate::interp::{self, Value};
use crate::output::{ExecutionRequest, ExecutionResult};
use crate::table::Datasets;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Runs snippets with the built-in interpreter
///
/// The interpreter exposes no filesystem, network or process operations, so
/// a snippet can only see the datasets handed to it. Evaluation happens on a
/// blocking thread bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct InProcessExecutor {
    timeout: Duration,
}

impl InProcessExecutor {
    /// Create an executor with the given wall-clock budget
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run a request and return the raw value
    pub async fn run(&self, request: &ExecutionRequest, datasets: &Datasets) -> Result<Value> {
        if request.code.trim().is_empty() {
            return Err(Error::EmptyCode);
        }
        let primary = datasets
            .get(&request.primary_source)
            .cloned()
            .ok_or_else(|| Error::DatasetNotFound(request.primary_source.clone()))?;

        let code = request.code.clone();
        let params = request.params();
        let catalog: Datasets = datasets
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        let task = tokio::task::spawn_blocking(move || {
            interp::run_snippet(&code, primary, &catalog, params)
        });
        tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
            .map_err(|e| Error::execution(format!("worker thread failed: {}", e)))?
    }
}

impl Default for InProcessExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Executor for InProcessExecutor {
    fn mode(&self) -> SandboxMode {
        SandboxMode::InProcess
    }

    #[instrument(skip(self, request, datasets), fields(source = %request.primary_source))]
    async fn execute(&self, request: &ExecutionRequest, datasets: &Datasets) -> ExecutionResult {
        match self.run(request, datasets).await {
            Ok(value) => {
                let result = ExecutionResult::from_value(&value);
                debug!(truncated = result.truncated, "In-process execution completed");
                result
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "In-process execution failed");
                ExecutionResult::from_error(&e)
            }
        }
    }
}
