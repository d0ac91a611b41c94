//! Component initialization
//!
//! Builds the data registry, LLM provider and orchestrator from the loaded
//! configuration.

use super::config::AppConfig;
use anyhow::{bail, Context, Result};
use chaos_core::{ApprovalGate, LlmSettings, Orchestrator};
use chaos_data::{DataRegistry, SchemaLoader};
use chaos_llm::{LlmProvider, OpenRouterConfig, OpenRouterProvider};
use chaos_sandbox::{SandboxExecutor, SandboxMode, WorkerRuntime};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Runtime for isolated workers: configured, or detected
pub async fn resolve_runtime(config: &AppConfig) -> WorkerRuntime {
    match (config.sandbox.mode, config.sandbox.runtime) {
        (_, Some(runtime)) => runtime,
        (SandboxMode::Isolated, None) => WorkerRuntime::detect().await,
        (SandboxMode::InProcess, None) => WorkerRuntime::default(),
    }
}

/// Discover and connect the datasets under `datasets_dir`
pub async fn init_registry(config: &AppConfig, datasets_dir: &Path) -> Result<DataRegistry> {
    let runtime = resolve_runtime(config).await;
    let sandbox = config.sandbox.sandbox_config(datasets_dir, runtime);
    info!(mode = %sandbox.mode, runtime = %runtime, "Initializing sandbox");
    let executor = Arc::new(SandboxExecutor::from_config(sandbox));

    let mut schema = SchemaLoader::new();
    let schema_path = config.data.schema_path(datasets_dir);
    if let Err(e) = schema.load(&schema_path) {
        warn!(path = %schema_path.display(), error = %e, "Ignoring unreadable schema metadata");
    }

    let mut registry = DataRegistry::new(executor).with_schema(schema);
    let added = registry
        .auto_discover(datasets_dir)
        .with_context(|| format!("Failed to scan {}", datasets_dir.display()))?;
    if added == 0 {
        warn!(dir = %datasets_dir.display(), "No datasets found");
    }
    let connected = registry.connect_all().await;
    info!(added, connected, "Data sources ready");
    Ok(registry)
}

/// Create the configured LLM provider
pub fn init_provider(config: &AppConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.llm.provider.as_str() {
        "openrouter" => {
            let mut provider_config = OpenRouterConfig::from_env()
                .context("OpenRouter is not configured (set OPENROUTER_API_KEY)")?
                .with_timeout(Duration::from_secs(config.llm.timeout_secs));
            if let Some(base_url) = &config.llm.base_url {
                provider_config = provider_config.with_base_url(base_url.clone());
            }
            if !config.llm.model.is_empty() {
                provider_config = provider_config.with_model(config.llm.model.clone());
            }
            Ok(Arc::new(OpenRouterProvider::new(provider_config)?))
        }
        other => bail!("Unsupported LLM provider: {}", other),
    }
}

/// Model settings shared by every agent
pub fn llm_settings(config: &AppConfig) -> LlmSettings {
    let mut settings = LlmSettings::default().with_max_tokens(config.llm.max_tokens);
    if let Some(temperature) = config.llm.temperature {
        settings = settings.with_temperature(temperature);
    }
    settings
}

/// Build an orchestrator over the datasets under `datasets_dir`
pub async fn init_orchestrator(
    config: &AppConfig,
    datasets_dir: &Path,
    approval: Arc<dyn ApprovalGate>,
) -> Result<Orchestrator> {
    let provider = init_provider(config)?;
    let registry = Arc::new(init_registry(config, datasets_dir).await?);
    Ok(
        Orchestrator::with_llm(provider, registry, approval, llm_settings(config))
            .with_config(config.engine.orchestrator_config()),
    )
}
