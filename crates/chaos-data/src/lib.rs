//! CHAOS Data - Tabular data sources
//!
//! This crate provides the data layer of the assistant:
//! - Source: the `DataSource` contract (connect, schema, `exec` queries)
//! - CSV: one CSV file per dataset, loaded into a shared catalog
//! - Registry: registration, recursive discovery and prompt rendering
//! - Schema: optional `schema.yaml` metadata

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod csv_source;
pub mod error;
pub mod registry;
pub mod schema;
pub mod source;

pub use csv_source::{Catalog, CsvDataSource};
pub use error::{Error, Result};
pub use registry::DataRegistry;
pub use schema::SchemaLoader;
pub use source::{ColumnSchema, DataSource, QueryKind, QueryParams, Schema};
