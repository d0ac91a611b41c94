//! CSV-backed data source

use crate::error::{Error, Result};
use crate::source::{ColumnSchema, DataSource, QueryKind, QueryParams, Schema};
use async_trait::async_trait;
use chaos_sandbox::{Datasets, ExecutionRequest, ExecutionResult, Executor, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Loaded datasets shared by every source of one registry
///
/// Each source inserts its table on connect, so a snippet run against one
/// source can join any other connected dataset by name.
pub type Catalog = Arc<RwLock<Datasets>>;

/// One CSV file exposed as a data source
pub struct CsvDataSource {
    name: String,
    path: PathBuf,
    description: String,
    catalog: Catalog,
    executor: Arc<dyn Executor>,
}

impl CsvDataSource {
    /// Create a source for `path` sharing `catalog`
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        catalog: Catalog,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let path = path.into();
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            name: name.into(),
            description: format!("Data from {}", file),
            path,
            catalog,
            executor,
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn table(&self) -> Result<Arc<Table>> {
        self.connect().await?;
        self.catalog
            .read()
            .await
            .get(&self.name)
            .cloned()
            .ok_or_else(|| Error::NotFound(self.name.clone()))
    }
}

#[async_trait]
impl DataSource for CsvDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn connect(&self) -> Result<()> {
        if self.is_connected().await {
            return Ok(());
        }
        let name = self.name.clone();
        let path = self.path.clone();
        let table = tokio::task::spawn_blocking(move || Table::from_csv_path(&name, &path))
            .await
            .map_err(|e| Error::Load {
                name: self.name.clone(),
                message: e.to_string(),
            })?
            .map_err(|e| Error::Load {
                name: self.name.clone(),
                message: e.to_string(),
            })?;
        info!(source = %self.name, rows = table.len(), columns = table.width(), "Dataset loaded");
        self.catalog
            .write()
            .await
            .entry(self.name.clone())
            .or_insert_with(|| Arc::new(table));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.catalog.write().await.remove(&self.name).is_some() {
            debug!(source = %self.name, "Dataset released");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.catalog.read().await.contains_key(&self.name)
    }

    async fn get_schema(&self) -> Result<Schema> {
        let table = self.table().await?;
        let columns = table
            .dtypes()
            .into_iter()
            .map(|(name, dtype)| {
                let nulls = table
                    .column(&name)
                    .map(|c| c.values.iter().filter(|v| v.is_null()).count())
                    .unwrap_or(0);
                ColumnSchema {
                    name,
                    dtype: dtype.to_string(),
                    nulls,
                }
            })
            .collect();
        Ok(Schema {
            name: self.name.clone(),
            rows: table.len(),
            columns,
        })
    }

    #[instrument(skip(self, params), fields(source = %self.name))]
    async fn query(&self, kind: QueryKind, params: &QueryParams) -> ExecutionResult {
        match kind {
            QueryKind::Exec => {
                let code = match params.get("code") {
                    Some(code) if !code.trim().is_empty() => code.clone(),
                    _ => return ExecutionResult::from_error(&chaos_sandbox::Error::EmptyCode),
                };
                if let Err(e) = self.connect().await {
                    return ExecutionResult::failure(e.to_string());
                }
                let datasets = self.catalog.read().await.clone();
                let request = params
                    .iter()
                    .filter(|(k, _)| k.as_str() != "code")
                    .fold(ExecutionRequest::new(code, self.name.clone()), |req, (k, v)| {
                        req.with_kwarg(k.clone(), serde_json::Value::String(v.clone()))
                    });
                self.executor.execute(&request, &datasets).await
            }
        }
    }
}

impl std::fmt::Debug for CsvDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvDataSource")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("mode", &self.executor.mode())
            .finish()
    }
}
