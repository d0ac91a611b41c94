//! Snippet executors
//!
//! Two interchangeable modes produce the same [`ExecutionResult`] shape:
//! - In-process: the restricted interpreter on a blocking thread
//! - Isolated: one worker process per request (Docker by default), fed over
//!   stdin/stdout and killed at the timeout

mod config;
mod in_process;
mod isolated;
mod limits;
mod runtime;
pub mod worker;


pub use config::{SandboxConfig, SandboxMode};
pub use in_process::InProcessExecutor;
pub use isolated::{IsolatedExecutor, CONTAINER_DATA_DIR};
pub use limits::ResourceLimits;
pub use runtime::{NetworkMode, WorkerRuntime};

use crate::output::{ExecutionRequest, ExecutionResult};
use crate::table::Datasets;
use async_trait::async_trait;

/// Runs analysis snippets against datasets
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execution mode of this executor
    fn mode(&self) -> SandboxMode;

    /// Run a request; failures are reported inside the result
    async fn execute(&self, request: &ExecutionRequest, datasets: &Datasets) -> ExecutionResult;
}

/// Executor selected from configuration
#[derive(Debug, Clone)]
pub enum SandboxExecutor {
    /// In-process interpreter
    InProcess(InProcessExecutor),
    /// Worker process per request
    Isolated(IsolatedExecutor),
}

impl SandboxExecutor {
    /// Build the executor named by `config.mode`
    #[must_use]
    pub fn from_config(config: SandboxConfig) -> Self {
        match config.mode {
            SandboxMode::InProcess => Self::InProcess(InProcessExecutor::new(config.limits.timeout)),
            SandboxMode::Isolated => Self::Isolated(IsolatedExecutor::new(config)),
        }
    }
}

impl Default for SandboxExecutor {
    fn default() -> Self {
        Self::InProcess(InProcessExecutor::default())
    }
}

#[async_trait]
impl Executor for SandboxExecutor {
    fn mode(&self) -> SandboxMode {
        match self {
            Self::InProcess(e) => e.mode(),
            Self::Isolated(e) => e.mode(),
        }
    }

    async fn execute(&self, request: &ExecutionRequest, datasets: &Datasets) -> ExecutionResult {
        match self {
            Self::InProcess(e) => e.execute(request, datasets).await,
            Self::Isolated(e) => e.execute(request, datasets).await,
        }
    }
}
