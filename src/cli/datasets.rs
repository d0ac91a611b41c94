//! Datasets command
//!
//! Lists the discovered datasets with their shape and columns.

use crate::app::{init, load_config};
use std::path::PathBuf;

/// List datasets
pub async fn run(datasets_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config()?;
    let dir = datasets_dir.unwrap_or_else(|| config.data.datasets_dir.clone());
    let registry = init::init_registry(&config, &dir).await?;

    if registry.is_empty() {
        println!("No datasets found under {}", dir.display());
        return Ok(());
    }

    println!("📂 {} ({} datasets)\n", dir.display(), registry.len());
    for name in registry.names() {
        match registry.schema_of(&name).await {
            Ok(schema) => {
                println!("  {} ({} rows)", name, schema.rows);
                println!("    {}", schema.columns_line());
            }
            Err(e) => println!("  {} ⚠️  {}", name, e),
        }
        if let Some(desc) = registry.schema().dataset_description(&name) {
            println!("    {}", desc);
        }
    }
    registry.disconnect_all().await;
    Ok(())
}
