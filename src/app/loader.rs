//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("CHAOS_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority), e.g. CHAOS_ENGINE__MAX_RETRIES
        .add_source(
            Environment::with_prefix("CHAOS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.llm.provider, "openrouter");
        assert_eq!(config.engine.max_retries, 3);
        assert_eq!(config.engine.max_step_attempts, 5);
        assert_eq!(config.engine.max_iterations, 50);
        assert_eq!(config.sandbox.timeout_secs, 30);
        assert!(config.sandbox.runtime.is_none());
        assert_eq!(config.data.datasets_dir.to_str(), Some("datasets"));
    }

    #[test]
    fn test_engine_config_maps_to_orchestrator() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(
                "[engine]\nmax_retries = 1\nverify = false\n",
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let orchestrator = config.engine.orchestrator_config();
        assert_eq!(orchestrator.loop_config.max_retries, 1);
        assert_eq!(orchestrator.loop_config.max_step_attempts, 5);
        assert!(orchestrator.skip_verification);
    }
}
