//! Worker runtimes and network modes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// How an isolated worker process is launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRuntime {
    /// `docker run` with resource limits and a read-only data mount
    #[default]
    Docker,
    /// A plain child process of this binary (no container boundary)
    Local,
}

impl WorkerRuntime {
    /// Pick Docker when its daemon answers, otherwise a local child process
    pub async fn detect() -> Self {
        if Self::check_docker().await {
            info!("Using Docker runtime for isolated execution");
            return Self::Docker;
        }
        warn!("Docker is not available, isolated execution falls back to local worker processes");
        Self::Local
    }

    /// Check if Docker is available
    pub async fn check_docker() -> bool {
        match tokio::process::Command::new("docker")
            .arg("info")
            .output()
            .await
        {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    /// Configuration name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Local => "local",
        }
    }

    /// Get human-readable name for the runtime
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Docker => "Docker",
            Self::Local => "Local process (no container isolation)",
        }
    }
}

impl fmt::Display for WorkerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerRuntime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "local" | "process" => Ok(Self::Local),
            other => Err(format!("unknown sandbox runtime: {}", other)),
        }
    }
}

/// Network mode for containerized workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// No network access (default)
    #[default]
    None,
    /// Bridge network
    Bridge,
    /// Host network
    Host,
}

impl NetworkMode {
    /// Convert to Docker network mode string
    #[must_use]
    pub fn as_docker_arg(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bridge => "bridge",
            Self::Host => "host",
        }
    }
}
