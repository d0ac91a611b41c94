//! Application configuration types

use chaos_core::{LoopConfig, OrchestratorConfig};
use chaos_sandbox::{ResourceLimits, SandboxConfig, SandboxMode, WorkerRuntime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub sandbox: SandboxAppConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// LLM provider settings; the API key comes from the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            model: String::new(),
            base_url: None,
            max_tokens: 4096,
            temperature: None,
            timeout_secs: 60,
        }
    }
}

/// Sensemaking loop budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_retries: u32,
    pub max_step_attempts: u32,
    pub max_iterations: u32,
    pub verify: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let loop_config = LoopConfig::default();
        Self {
            max_retries: loop_config.max_retries,
            max_step_attempts: loop_config.max_step_attempts,
            max_iterations: loop_config.max_iterations,
            verify: true,
        }
    }
}

impl EngineConfig {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::new()
            .with_loop_config(
                LoopConfig::new()
                    .with_max_retries(self.max_retries)
                    .with_max_step_attempts(self.max_step_attempts)
                    .with_max_iterations(self.max_iterations),
            )
            .with_verification(self.verify)
    }
}

/// Snippet execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxAppConfig {
    pub mode: SandboxMode,
    pub timeout_secs: u64,
    pub image: String,
    /// `None` detects Docker at startup
    pub runtime: Option<WorkerRuntime>,
    pub memory_mb: u64,
    pub cpu_percent: u32,
    pub max_pids: u32,
}

impl Default for SandboxAppConfig {
    fn default() -> Self {
        Self {
            mode: SandboxMode::InProcess,
            timeout_secs: 30,
            image: "chaos-sandbox:latest".to_string(),
            runtime: None,
            memory_mb: 512,
            cpu_percent: 100,
            max_pids: 64,
        }
    }
}

impl SandboxAppConfig {
    /// Executor configuration for `datasets_dir` with a resolved runtime
    pub fn sandbox_config(&self, datasets_dir: &Path, runtime: WorkerRuntime) -> SandboxConfig {
        let limits = ResourceLimits::default()
            .with_memory_mb(self.memory_mb)
            .with_cpu_percent(self.cpu_percent)
            .with_max_pids(self.max_pids);
        SandboxConfig {
            limits,
            image: self.image.clone(),
            ..SandboxConfig::default()
        }
        .with_mode(self.mode)
        .with_timeout(Duration::from_secs(self.timeout_secs))
        .with_runtime(runtime)
        .with_data_dir(datasets_dir)
    }
}

/// Dataset location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub datasets_dir: PathBuf,
    pub schema_file: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            datasets_dir: PathBuf::from("datasets"),
            schema_file: None,
        }
    }
}

impl DataConfig {
    /// Schema metadata file for `datasets_dir`
    pub fn schema_path(&self, datasets_dir: &Path) -> PathBuf {
        self.schema_file
            .clone()
            .unwrap_or_else(|| datasets_dir.join("schema.yaml"))
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
