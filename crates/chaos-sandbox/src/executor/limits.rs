//! Resource limits for isolated workers

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource limits applied to one snippet execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory limit in bytes (default: 512MB)
    pub memory_bytes: u64,
    /// CPU quota (percentage of one core, default: 100%)
    pub cpu_percent: u32,
    /// Wall-clock budget; the worker is killed when it is exceeded
    pub timeout: Duration,
    /// Maximum number of processes inside the container
    pub max_pids: u32,
    /// Disable swap
    pub no_swap: bool,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_bytes: 512 * 1024 * 1024,
            cpu_percent: 100,
            timeout: Duration::from_secs(30),
            max_pids: 64,
            no_swap: true,
        }
    }
}

impl ResourceLimits {
    /// Set the memory limit in megabytes
    #[must_use]
    pub fn with_memory_mb(mut self, mb: u64) -> Self {
        self.memory_bytes = mb * 1024 * 1024;
        self
    }

    /// Set the CPU quota, capped at one full core
    #[must_use]
    pub fn with_cpu_percent(mut self, percent: u32) -> Self {
        self.cpu_percent = percent.min(100);
        self
    }

    /// Set the wall-clock budget
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the process limit
    #[must_use]
    pub fn with_max_pids(mut self, max_pids: u32) -> Self {
        self.max_pids = max_pids;
        self
    }

    /// Convert to Docker resource arguments
    #[must_use]
    pub fn to_docker_args(&self) -> Vec<String> {
        let mut args = vec![format!("--memory={}b", self.memory_bytes)];
        if self.no_swap {
            args.push(format!("--memory-swap={}b", self.memory_bytes));
        }

        // microseconds per 100ms period
        let cpu_quota = u64::from(self.cpu_percent) * 1000;
        args.push(format!("--cpu-quota={}", cpu_quota));
        args.push("--cpu-period=100000".to_string());
        args.push(format!("--pids-limit={}", self.max_pids));
        args
    }
}
