//! Dataset discovery
//!
//! One dataset per CSV file, found recursively; the file stem is the
//! dataset name and the first file with a given stem wins.

use super::Table;
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Named datasets available to a snippet
pub type Datasets = BTreeMap<String, Arc<Table>>;

/// A discovered dataset file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    /// Dataset name (file stem)
    pub name: String,
    /// Path to the file
    pub path: PathBuf,
}

/// Find every CSV file under `dir`, sorted by path
pub fn discover_csv(dir: &Path) -> Result<Vec<DatasetFile>> {
    let mut paths = Vec::new();
    if dir.is_dir() {
        walk(dir, &mut paths)?;
    }
    paths.sort();

    let mut found: Vec<DatasetFile> = Vec::new();
    for path in paths {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if found.iter().any(|f| f.name == name) {
            debug!(path = %path.display(), "Skipping dataset with duplicate name");
            continue;
        }
        found.push(DatasetFile {
            name: name.to_string(),
            path,
        });
    }
    Ok(found)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Load every dataset under `dir`; unreadable files are skipped
pub fn load_datasets(dir: &Path) -> Result<Datasets> {
    let mut datasets = Datasets::new();
    for file in discover_csv(dir)? {
        match Table::from_csv_path(&file.name, &file.path) {
            Ok(table) => {
                datasets.insert(file.name, Arc::new(table));
            }
            Err(e) => warn!(dataset = %file.name, error = %e, "Failed to load dataset"),
        }
    }
    Ok(datasets)
}
