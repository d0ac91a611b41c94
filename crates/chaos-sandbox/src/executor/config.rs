//! Executor configuration

use super::limits::ResourceLimits;
use super::runtime::{NetworkMode, WorkerRuntime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where snippets run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxMode {
    /// Interpreted inside this process on a blocking thread
    InProcess,
    /// One worker process (or container) per execution
    #[default]
    Isolated,
}

impl SandboxMode {
    /// Configuration name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProcess => "in_process",
            Self::Isolated => "isolated",
        }
    }
}

impl fmt::Display for SandboxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SandboxMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "in_process" | "inprocess" | "local" => Ok(Self::InProcess),
            "isolated" | "subprocess" | "docker" => Ok(Self::Isolated),
            other => Err(format!("unknown sandbox mode: {}", other)),
        }
    }
}

/// Configuration for snippet execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Execution mode
    pub mode: SandboxMode,
    /// Resource limits; `timeout` applies to both modes
    pub limits: ResourceLimits,
    /// Container image holding the `chaos` binary
    pub image: String,
    /// How isolated workers are launched
    pub runtime: WorkerRuntime,
    /// Container network mode
    pub network: NetworkMode,
    /// Additional security options (Docker only)
    pub security_opts: Vec<String>,
    /// Directory holding the datasets, mounted read-only into containers
    pub data_dir: PathBuf,
    /// Explicit worker command line, replacing the runtime's default
    #[serde(default)]
    pub worker_command: Option<Vec<String>>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            mode: SandboxMode::default(),
            limits: ResourceLimits::default(),
            image: "chaos-sandbox:latest".to_string(),
            runtime: WorkerRuntime::default(),
            network: NetworkMode::None,
            security_opts: vec!["no-new-privileges:true".to_string()],
            data_dir: PathBuf::from("datasets"),
            worker_command: None,
        }
    }
}

impl SandboxConfig {
    /// Set the execution mode
    #[must_use]
    pub fn with_mode(mut self, mode: SandboxMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the wall-clock budget
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.limits.timeout = timeout;
        self
    }

    /// Set the worker runtime
    #[must_use]
    pub fn with_runtime(mut self, runtime: WorkerRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Set the dataset directory
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Replace the worker command line
    #[must_use]
    pub fn with_worker_command(mut self, command: Vec<String>) -> Self {
        self.worker_command = Some(command);
        self
    }
}
