//! Registry - Data source registration and discovery
//!
//! Sources are registered by hand or discovered from a datasets directory:
//! every `*.csv` file found recursively becomes a source named after its
//! file stem. All sources of one registry share a catalog of loaded tables,
//! which is what lets a snippet join across datasets.

use crate::csv_source::{Catalog, CsvDataSource};
use crate::error::{Error, Result};
use crate::schema::SchemaLoader;
use crate::source::{DataSource, QueryKind, QueryParams, Schema};
use chaos_sandbox::{discover_csv, ExecutionResult, Executor};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry for managing data sources
pub struct DataRegistry {
    sources: BTreeMap<String, Arc<dyn DataSource>>,
    catalog: Catalog,
    executor: Arc<dyn Executor>,
    schema: SchemaLoader,
}

impl DataRegistry {
    /// Create an empty registry whose sources run snippets on `executor`
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            sources: BTreeMap::new(),
            catalog: Catalog::default(),
            executor,
            schema: SchemaLoader::new(),
        }
    }

    /// Attach dataset metadata
    #[must_use]
    pub fn with_schema(mut self, schema: SchemaLoader) -> Self {
        self.schema = schema;
        self
    }

    /// Shared catalog of loaded tables
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        Arc::clone(&self.catalog)
    }

    /// Executor used by discovered sources
    #[must_use]
    pub fn executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.executor)
    }

    /// Dataset metadata
    #[must_use]
    pub fn schema(&self) -> &SchemaLoader {
        &self.schema
    }

    /// Register a source, replacing any source with the same name
    pub fn register(&mut self, source: Arc<dyn DataSource>) {
        let name = source.name().to_string();
        debug!(source = %name, "Registering data source");
        self.sources.insert(name, source);
    }

    /// Remove a source
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn DataSource>> {
        self.sources.remove(name)
    }

    /// Get a source by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn DataSource>> {
        self.sources.get(name).cloned()
    }

    /// Check if a source exists
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Registered source names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    /// Number of sources
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Register every CSV file under `dir`
    ///
    /// Names already registered are kept, so the first file with a given
    /// stem wins. A missing directory registers nothing. Returns the number
    /// of new sources.
    pub fn auto_discover(&mut self, dir: &Path) -> Result<usize> {
        let mut added = 0;
        for file in discover_csv(dir)? {
            if self.sources.contains_key(&file.name) {
                debug!(source = %file.name, path = %file.path.display(), "Skipping duplicate dataset name");
                continue;
            }
            let source = CsvDataSource::new(
                file.name.clone(),
                file.path,
                self.catalog(),
                self.executor(),
            );
            let source = match self.schema.dataset_description(&file.name) {
                Some(desc) => source.with_description(desc),
                None => source,
            };
            self.register(Arc::new(source));
            added += 1;
        }
        info!(dir = %dir.display(), added, total = self.sources.len(), "Discovered datasets");
        Ok(added)
    }

    /// Connect every source; failures are logged and skipped
    ///
    /// Returns the number of connected sources.
    pub async fn connect_all(&self) -> usize {
        let mut connected = 0;
        for (name, source) in &self.sources {
            match source.connect().await {
                Ok(()) => connected += 1,
                Err(e) => warn!(source = %name, error = %e, "Failed to connect data source"),
            }
        }
        connected
    }

    /// Disconnect every source
    pub async fn disconnect_all(&self) {
        for (name, source) in &self.sources {
            if let Err(e) = source.disconnect().await {
                warn!(source = %name, error = %e, "Failed to disconnect data source");
            }
        }
    }

    /// Schema of one source
    pub async fn schema_of(&self, name: &str) -> Result<Schema> {
        let source = self
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        source.get_schema().await
    }

    /// Query a source by name
    ///
    /// An unknown source yields a `Dataset not found` result rather than an
    /// error, like every other query failure.
    pub async fn query(&self, source: &str, kind: QueryKind, params: &QueryParams) -> ExecutionResult {
        match self.sources.get(source) {
            Some(s) => s.query(kind, params).await,
            None => ExecutionResult::from_error(&chaos_sandbox::Error::DatasetNotFound(
                source.to_string(),
            )),
        }
    }

    /// Describe the available data for prompts
    pub async fn sources_prompt(&self) -> String {
        if self.sources.is_empty() {
            return "No data sources available.".to_string();
        }

        let mut lines = vec!["Available data sources:".to_string()];
        for (name, source) in &self.sources {
            lines.push(String::new());
            if self.schema.dataset(name).is_some() {
                lines.push(self.schema.format_dataset(name));
            } else {
                lines.push(format!("- {}: {}", name, source.description()));
            }
            match source.get_schema().await {
                Ok(schema) => {
                    lines.push(format!("  Rows: {}", schema.rows));
                    if !schema.columns.is_empty() {
                        lines.push(format!("  Columns: {}", schema.columns_line()));
                    }
                }
                Err(e) => warn!(source = %name, error = %e, "Schema unavailable"),
            }
        }

        let tail = self.schema.format_relationships();
        if !tail.is_empty() {
            lines.push(String::new());
            lines.push(tail);
        }
        lines.join("\n")
    }
}

impl std::fmt::Debug for DataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRegistry")
            .field("sources", &self.names())
            .field("mode", &self.executor.mode())
            .finish()
    }
}
