//! Dataset metadata from `schema.yaml`
//!
//! The metadata file is optional. When present it describes each dataset's
//! columns (type, unit, typical range, allowed values), relationships
//! between datasets and hints for common analyses; all of it is rendered
//! into the planner's view of the available data.

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_yaml::Value as Yaml;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Metadata for one column
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColumnMeta {
    /// Declared type
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Measurement unit
    pub unit: Option<String>,
    /// Free-form description
    pub description: Option<String>,
    /// `[low, high]`
    pub typical_range: Vec<Yaml>,
    /// Allowed values for categorical columns
    pub values: Vec<Yaml>,
}

/// Metadata for one dataset
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatasetMeta {
    /// Free-form description
    pub description: String,
    /// Where the data comes from
    pub source: Option<String>,
    /// Grouping label
    pub category: Option<String>,
    /// Approximate row count
    pub row_count: Option<Yaml>,
    /// Column metadata by name
    pub columns: BTreeMap<String, ColumnMeta>,
}

/// How two datasets relate
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Relationship {
    /// Free-form description
    pub description: String,
    /// Column to join on
    pub join_key: Option<String>,
}

/// Guidance for a family of questions
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisHint {
    /// Free-form description
    pub description: String,
    /// `all` or a list of dataset names
    pub relevant_datasets: Option<Yaml>,
}

/// Parsed `schema.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaFile {
    /// Schema version
    pub version: Option<Yaml>,
    /// Overall description
    pub description: String,
    /// Datasets by name
    pub datasets: BTreeMap<String, DatasetMeta>,
    /// Relationships by name
    pub relationships: BTreeMap<String, Relationship>,
    /// Analysis hints by name
    pub analysis_hints: BTreeMap<String, AnalysisHint>,
}

/// Loads and renders dataset metadata
#[derive(Debug, Clone, Default)]
pub struct SchemaLoader {
    schema: SchemaFile,
    loaded: bool,
}

impl SchemaLoader {
    /// Create an empty loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load metadata from a file; a missing file leaves the loader empty
    pub fn load(&mut self, path: &Path) -> Result<bool> {
        if !path.exists() {
            debug!(path = %path.display(), "No schema metadata file");
            return Ok(false);
        }
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text)?;
        Ok(true)
    }

    /// Load metadata from YAML text
    pub fn load_str(&mut self, text: &str) -> Result<()> {
        let schema: Option<SchemaFile> =
            serde_yaml::from_str(text).map_err(|e| Error::Schema(e.to_string()))?;
        self.schema = schema.unwrap_or_default();
        self.loaded = true;
        Ok(())
    }

    /// Whether metadata has been loaded
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Schema version, `unknown` when absent
    #[must_use]
    pub fn version(&self) -> String {
        self.schema
            .version
            .as_ref()
            .map_or_else(|| "unknown".to_string(), scalar)
    }

    /// Metadata for one dataset
    #[must_use]
    pub fn dataset(&self, name: &str) -> Option<&DatasetMeta> {
        self.schema.datasets.get(name)
    }

    /// Description of one dataset
    #[must_use]
    pub fn dataset_description(&self, name: &str) -> Option<String> {
        self.dataset(name)
            .map(|d| one_line(&d.description))
            .filter(|d| !d.is_empty())
    }

    /// Column descriptions of one dataset
    #[must_use]
    pub fn column_descriptions(&self, name: &str) -> BTreeMap<String, String> {
        self.dataset(name)
            .map(|d| {
                d.columns
                    .iter()
                    .map(|(c, meta)| (c.clone(), meta.description.clone().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Detailed block for one dataset
    #[must_use]
    pub fn format_dataset(&self, name: &str) -> String {
        let Some(meta) = self.dataset(name) else {
            return format!("- {}: No schema information available", name);
        };

        let mut header = format!("- {}", name);
        if let Some(source) = &meta.source {
            header.push_str(&format!(" ({})", source));
        }
        let mut lines = vec![header];

        let desc = one_line(&meta.description);
        if !desc.is_empty() {
            lines.push(format!("  Description: {}", desc));
        }
        if let Some(category) = &meta.category {
            lines.push(format!("  Category: {}", category));
        }
        if let Some(rows) = &meta.row_count {
            lines.push(format!("  Approximate rows: {}", scalar(rows)));
        }
        if !meta.columns.is_empty() {
            lines.push("  Columns:".to_string());
            for (col, info) in &meta.columns {
                lines.push(format!("    {}", column_line(col, info)));
                if !info.values.is_empty() {
                    let values: Vec<String> = info.values.iter().map(scalar).collect();
                    lines.push(format!("      Values: {}", values.join(", ")));
                }
            }
        }
        lines.join("\n")
    }

    /// Relationships and analysis hints
    #[must_use]
    pub fn format_relationships(&self) -> String {
        let mut lines = Vec::new();
        if !self.schema.relationships.is_empty() {
            lines.push("Dataset relationships:".to_string());
            for (name, rel) in &self.schema.relationships {
                lines.push(format!("  - {}: {}", name, one_line(&rel.description)));
                if let Some(key) = &rel.join_key {
                    lines.push(format!("    Join key: {}", key));
                }
            }
        }
        if !self.schema.analysis_hints.is_empty() {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push("Analysis hints:".to_string());
            for (name, hint) in &self.schema.analysis_hints {
                lines.push(format!("  - {}: {}", name, one_line(&hint.description)));
                match &hint.relevant_datasets {
                    Some(Yaml::Sequence(items)) if !items.is_empty() => {
                        let names: Vec<String> = items.iter().map(scalar).collect();
                        lines.push(format!("    Relevant datasets: {}", names.join(", ")));
                    }
                    Some(Yaml::String(all)) => {
                        lines.push(format!("    Relevant datasets: {}", all));
                    }
                    _ => {}
                }
            }
        }
        lines.join("\n")
    }

    /// Every dataset plus relationships and hints
    #[must_use]
    pub fn format_all(&self) -> String {
        if !self.loaded {
            return "No schema information available.".to_string();
        }
        let mut lines = vec![
            "Available datasets with schema information:".to_string(),
            String::new(),
        ];
        for name in self.schema.datasets.keys() {
            lines.push(self.format_dataset(name));
            lines.push(String::new());
        }
        let tail = self.format_relationships();
        if !tail.is_empty() {
            lines.push(tail);
        }
        lines.join("\n")
    }

    /// One line per dataset with `name:type[unit]` columns
    #[must_use]
    pub fn format_compact(&self) -> String {
        if !self.loaded {
            return "No schema information available.".to_string();
        }
        let mut lines = vec!["Datasets:".to_string()];
        for (name, meta) in &self.schema.datasets {
            let mut header = format!("- {}", name);
            if let Some(source) = &meta.source {
                header.push_str(&format!(" ({})", source));
            }
            let first = meta.description.trim().lines().next().unwrap_or_default();
            header.push_str(&format!(": {}", first));
            lines.push(header);

            let cols: Vec<String> = meta
                .columns
                .iter()
                .map(|(col, info)| {
                    let kind = info.kind.as_deref().unwrap_or("?");
                    match &info.unit {
                        Some(unit) => format!("{}:{}[{}]", col, kind, unit),
                        None => format!("{}:{}", col, kind),
                    }
                })
                .collect();
            if !cols.is_empty() {
                lines.push(format!("  Columns: {}", cols.join(", ")));
            }
        }
        lines.join("\n")
    }
}

fn column_line(name: &str, info: &ColumnMeta) -> String {
    let mut line = format!("- {} ({})", name, info.kind.as_deref().unwrap_or("unknown"));
    if let Some(unit) = &info.unit {
        line.push_str(&format!(" [{}]", unit));
    }
    if let Some(desc) = info.description.as_deref().filter(|d| !d.is_empty()) {
        line.push_str(&format!(": {}", one_line(desc)));
    }
    if let [low, high, ..] = info.typical_range.as_slice() {
        line.push_str(&format!(" (range: {}-{})", scalar(low), scalar(high)));
    }
    line
}

fn one_line(text: &str) -> String {
    text.trim().replace('\n', " ")
}

fn scalar(v: &Yaml) -> String {
    match v {
        Yaml::String(s) => s.clone(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
version: 2
description: Personal fitness data
datasets:
  garmin_hr:
    source: Garmin
    description: |
      Heart rate samples
      recorded every minute
    row_count: 1200
    columns:
      bpm:
        type: int
        unit: bpm
        description: Beats per minute
        typical_range: [40, 190]
      zone:
        type: string
        values: [easy, tempo, max]
  ios_activity:
    description: Daily step counts
relationships:
  hr_activity:
    description: Same calendar days
    join_key: date
analysis_hints:
  trends:
    description: Compare weekly averages
    relevant_datasets: [garmin_hr, ios_activity]
  overview:
    description: Start broad
    relevant_datasets: all
"#;

    fn loader() -> SchemaLoader {
        let mut loader = SchemaLoader::new();
        loader.load_str(SCHEMA).unwrap();
        loader
    }

    #[test]
    fn test_dataset_block() {
        let loader = loader();
        assert!(loader.is_loaded());
        assert_eq!(loader.version(), "2");

        let block = loader.format_dataset("garmin_hr");
        assert!(block.starts_with("- garmin_hr (Garmin)"));
        assert!(block.contains("Description: Heart rate samples recorded every minute"));
        assert!(block.contains("Approximate rows: 1200"));
        assert!(block.contains("- bpm (int) [bpm]: Beats per minute (range: 40-190)"));
        assert!(block.contains("Values: easy, tempo, max"));

        assert_eq!(
            loader.format_dataset("unknown"),
            "- unknown: No schema information available"
        );
    }

    #[test]
    fn test_relationships_and_hints() {
        let text = loader().format_relationships();
        assert!(text.contains("- hr_activity: Same calendar days"));
        assert!(text.contains("Join key: date"));
        assert!(text.contains("Relevant datasets: garmin_hr, ios_activity"));
        assert!(text.contains("Relevant datasets: all"));
    }

    #[test]
    fn test_compact_format() {
        let text = loader().format_compact();
        assert!(text.contains("- garmin_hr (Garmin): Heart rate samples"));
        assert!(text.contains("bpm:int[bpm]"));
        assert!(text.contains("zone:string"));
    }

    #[test]
    fn test_column_descriptions() {
        let descs = loader().column_descriptions("garmin_hr");
        assert_eq!(descs.get("bpm").map(String::as_str), Some("Beats per minute"));
        assert_eq!(descs.get("zone").map(String::as_str), Some(""));
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = SchemaLoader::new();
        assert!(!loader.load(&dir.path().join("schema.yaml")).unwrap());
        assert!(!loader.is_loaded());
        assert_eq!(loader.format_all(), "No schema information available.");

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "datasets: [unclosed").unwrap();
        assert!(matches!(loader.load(&bad), Err(Error::Schema(_))));
    }

    #[test]
    fn test_empty_file_loads() {
        let mut loader = SchemaLoader::new();
        loader.load_str("").unwrap();
        assert!(loader.is_loaded());
        assert_eq!(loader.version(), "unknown");
    }
}
