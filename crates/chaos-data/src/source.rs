//! Data source contract

use crate::error::Result;
use async_trait::async_trait;
use chaos_sandbox::ExecutionResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Query parameters; `code` holds the analysis snippet for [`QueryKind::Exec`]
pub type QueryParams = BTreeMap<String, String>;

/// Kind of query a data source accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Run an analysis snippet against the dataset
    #[default]
    Exec,
}

impl QueryKind {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exec => "exec",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exec" => Ok(Self::Exec),
            other => Err(format!("unsupported query kind: {}", other)),
        }
    }
}

/// One column of a dataset schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name
    pub name: String,
    /// Inferred type (`int64`, `float64`, `bool`, `object`)
    pub dtype: String,
    /// Number of missing values
    pub nulls: usize,
}

/// Shape and columns of a dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Dataset name
    pub name: String,
    /// Number of rows
    pub rows: usize,
    /// Columns in file order
    pub columns: Vec<ColumnSchema>,
}

impl Schema {
    /// Column names
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Compact `name (dtype)` listing for prompts
    #[must_use]
    pub fn columns_line(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{} ({})", c.name, c.dtype))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A queryable tabular dataset
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Dataset name (file stem)
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Load the dataset; calling it again is a no-op
    async fn connect(&self) -> Result<()>;

    /// Release the loaded dataset
    async fn disconnect(&self) -> Result<()>;

    /// Whether the dataset is loaded
    async fn is_connected(&self) -> bool;

    /// Columns and shape of the dataset
    async fn get_schema(&self) -> Result<Schema>;

    /// Run a query; failures are reported inside the result
    async fn query(&self, kind: QueryKind, params: &QueryParams) -> ExecutionResult;

    /// Example requests shown to the planner
    fn example_queries(&self) -> Vec<String> {
        vec![
            format!("Get all rows from {}", self.name()),
            format!("Filter {} where column_name = value", self.name()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_kind() {
        assert_eq!("exec".parse::<QueryKind>().unwrap(), QueryKind::Exec);
        assert_eq!(" EXEC ".parse::<QueryKind>().unwrap(), QueryKind::Exec);
        assert!("sql".parse::<QueryKind>().is_err());
        assert_eq!(QueryKind::Exec.to_string(), "exec");
        assert_eq!(serde_json::to_string(&QueryKind::Exec).unwrap(), "\"exec\"");
    }

    #[test]
    fn test_schema_columns_line() {
        let schema = Schema {
            name: "sales".to_string(),
            rows: 3,
            columns: vec![
                ColumnSchema {
                    name: "region".to_string(),
                    dtype: "object".to_string(),
                    nulls: 0,
                },
                ColumnSchema {
                    name: "amount".to_string(),
                    dtype: "int64".to_string(),
                    nulls: 1,
                },
            ],
        };
        assert_eq!(schema.column_names(), vec!["region", "amount"]);
        assert_eq!(schema.columns_line(), "region (object), amount (int64)");
    }
}
