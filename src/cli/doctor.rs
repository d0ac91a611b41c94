//! Doctor command
//!
//! Checks configuration, credentials, datasets and the sandbox runtime.

use crate::app::{init, load_config, AppConfig};
use chaos_sandbox::{discover_csv, SandboxMode, WorkerRuntime};
use std::path::Path;

fn has_valid_key(content: &str, key_name: &str, valid_prefix: &str) -> bool {
    content
        .lines()
        .find(|l| l.starts_with(&format!("{}=", key_name)))
        .map(|l| l.trim_start_matches(&format!("{}=", key_name)))
        .map(|v| !v.is_empty() && !v.contains("your") && v.starts_with(valid_prefix))
        .unwrap_or(false)
}

pub async fn run() -> anyhow::Result<()> {
    println!("🏥 CHAOS Doctor\n");

    let config = match check_config() {
        Some(config) => config,
        None => {
            println!("\n⚠️  Fix the configuration before running other checks.");
            std::process::exit(1);
        }
    };

    let mut all_ok = true;
    all_ok &= check_api_key(&config);
    all_ok &= check_datasets(&config);
    all_ok &= check_sandbox(&config).await;

    println!();
    if all_ok {
        println!("✅ All checks passed! Ready to ask questions.");
    } else {
        println!("⚠️  Some checks failed. Please fix the issues above.");
        std::process::exit(1);
    }

    Ok(())
}

fn check_config() -> Option<AppConfig> {
    print!("Checking configuration... ");
    match load_config() {
        Ok(config) => {
            println!("✅ Loaded (provider: {})", config.llm.provider);
            Some(config)
        }
        Err(e) => {
            println!("❌ {:#}", e);
            None
        }
    }
}

fn check_api_key(config: &AppConfig) -> bool {
    print!("Checking LLM API key... ");

    if config.llm.provider != "openrouter" {
        println!("❌ Unsupported provider: {}", config.llm.provider);
        return false;
    }

    let from_env = std::env::var("OPENROUTER_API_KEY")
        .map(|v| has_valid_key(&format!("OPENROUTER_API_KEY={}", v), "OPENROUTER_API_KEY", "sk-or-"))
        .unwrap_or(false);
    let from_file = std::fs::read_to_string(".env")
        .map(|content| has_valid_key(&content, "OPENROUTER_API_KEY", "sk-or-"))
        .unwrap_or(false);

    if from_env || from_file {
        println!("✅ OPENROUTER_API_KEY configured");
        if let Err(e) = init::init_provider(config) {
            println!("  ⚠️  Provider setup failed: {:#}", e);
            return false;
        }
        true
    } else {
        println!("❌ OPENROUTER_API_KEY not set");
        println!("  Add it to your environment or a .env file");
        false
    }
}

fn check_datasets(config: &AppConfig) -> bool {
    let dir = &config.data.datasets_dir;
    print!("Checking datasets in {}... ", dir.display());

    if !dir.exists() {
        println!("❌ Directory not found");
        println!("  Create it and add CSV files, or set CHAOS_DATA__DATASETS_DIR");
        return false;
    }

    match discover_csv(dir) {
        Ok(files) if files.is_empty() => {
            println!("⚠️  No CSV files found");
            false
        }
        Ok(files) => {
            println!("✅ {} datasets", files.len());
            let schema = config.data.schema_path(dir);
            if schema.exists() {
                println!("  ✅ Metadata: {}", schema.display());
            } else {
                println!("  ℹ️  No {} (optional)", file_name(&schema));
            }
            true
        }
        Err(e) => {
            println!("❌ {}", e);
            false
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn check_sandbox(config: &AppConfig) -> bool {
    print!("Checking sandbox... ");

    match config.sandbox.mode {
        SandboxMode::InProcess => {
            println!("✅ In-process (snippets run inside the assistant)");
            true
        }
        SandboxMode::Isolated => {
            let runtime = init::resolve_runtime(config).await;
            if runtime == WorkerRuntime::Docker && !WorkerRuntime::check_docker().await {
                println!("❌ Docker configured but not available");
                println!("  Start Docker, or set sandbox.runtime = \"local\"");
                return false;
            }
            println!("✅ Isolated ({})", runtime.display_name());
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_valid_key() {
        let content = "OPENROUTER_API_KEY=sk-or-v1-abc\nOTHER=1\n";
        assert!(has_valid_key(content, "OPENROUTER_API_KEY", "sk-or-"));
        assert!(!has_valid_key(content, "MISSING_KEY", ""));
        assert!(!has_valid_key(
            "OPENROUTER_API_KEY=sk-or-your-key",
            "OPENROUTER_API_KEY",
            "sk-or-"
        ));
        assert!(!has_valid_key("OPENROUTER_API_KEY=", "OPENROUTER_API_KEY", ""));
        assert!(!has_valid_key("OPENROUTER_API_KEY=abc", "OPENROUTER_API_KEY", "sk-or-"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/data/schema.yaml")), "schema.yaml");
    }
}
