//! Isolated execution in a worker process per request

use super::config::SandboxConfig;
use super::runtime::WorkerRuntime;
use super::{Executor, SandboxMode};
use crate::error::{Error, Result};
use crate::output::{truncate, ExecutionRequest, ExecutionResult};
use crate::table::Datasets;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Mount point of the dataset directory inside containers
pub const CONTAINER_DATA_DIR: &str = "/data";

/// Runs each request in a fresh worker process
///
/// The worker reads one JSON request on stdin and answers with one JSON
/// result on stdout. It is killed when the timeout expires.
#[derive(Debug, Clone)]
pub struct IsolatedExecutor {
    config: SandboxConfig,
}

impl IsolatedExecutor {
    /// Create an executor
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Get the sandbox configuration
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Command line used to launch one worker
    pub fn command_line(&self) -> Result<Vec<String>> {
        if let Some(command) = &self.config.worker_command {
            return Ok(command.clone());
        }
        match self.config.runtime {
            WorkerRuntime::Docker => Ok(self.docker_args()),
            WorkerRuntime::Local => {
                let exe = std::env::current_exe()?;
                Ok(vec![
                    exe.display().to_string(),
                    "worker".to_string(),
                    "--data-dir".to_string(),
                    self.config.data_dir.display().to_string(),
                ])
            }
        }
    }

    fn docker_args(&self) -> Vec<String> {
        let mut args = vec![
            "docker".to_string(),
            "run".to_string(),
            "--rm".to_string(),
            "-i".to_string(),
            format!("--network={}", self.config.network.as_docker_arg()),
        ];
        args.extend(self.config.limits.to_docker_args());
        for opt in &self.config.security_opts {
            args.push(format!("--security-opt={}", opt));
        }
        args.push(format!(
            "--mount=type=bind,source={},target={},readonly",
            absolute(&self.config.data_dir).display(),
            CONTAINER_DATA_DIR
        ));
        args.push(self.config.image.clone());
        args.extend(
            ["chaos", "worker", "--data-dir", CONTAINER_DATA_DIR]
                .iter()
                .map(|s| (*s).to_string()),
        );
        args
    }

    /// Run a request and return the worker's answer
    pub async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        if request.code.trim().is_empty() {
            return Err(Error::EmptyCode);
        }
        let argv = self.command_line()?;
        let (program, rest) = argv
            .split_first()
            .ok_or_else(|| Error::InvalidInput("empty worker command".to_string()))?;
        let payload = serde_json::to_vec(request)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        debug!(args = ?argv, "Launching sandbox worker");

        let mut child = Command::new(program)
            .args(rest)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::RuntimeUnavailable(program.clone()),
                _ => Error::Io(e),
            })?;

        let stdin = child.stdin.take();
        let interaction = async move {
            if let Some(mut pipe) = stdin {
                // a worker that exits early closes its end; its exit status tells the story
                if let Err(e) = pipe.write_all(&payload).await {
                    debug!(error = %e, "Worker closed stdin early");
                }
            }
            child.wait_with_output().await
        };

        let timeout = self.config.limits.timeout;
        let output = tokio::time::timeout(timeout, interaction)
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        info!(
            exit_code = exit_code,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Sandbox execution completed"
        );

        if !output.status.success() {
            return Err(Error::WorkerFailed {
                code: exit_code,
                stderr,
            });
        }

        let mut result: ExecutionResult = serde_json::from_str(stdout.trim())
            .map_err(|_| Error::InvalidResponse(stdout.chars().take(500).collect()))?;
        if let Some(text) = result.result.take() {
            let (text, cut) = truncate(text);
            result.result = Some(text);
            result.truncated |= cut;
        }
        Ok(result)
    }
}

fn absolute(path: &Path) -> std::path::PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[async_trait]
impl Executor for IsolatedExecutor {
    fn mode(&self) -> SandboxMode {
        SandboxMode::Isolated
    }

    #[instrument(skip(self, request, _datasets), fields(source = %request.primary_source, runtime = %self.config.runtime))]
    async fn execute(&self, request: &ExecutionRequest, _datasets: &Datasets) -> ExecutionResult {
        match self.run(request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Isolated execution failed");
                ExecutionResult::from_error(&e)
            }
        }
    }
}
