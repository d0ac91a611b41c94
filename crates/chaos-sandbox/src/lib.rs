//! CHAOS Sandbox - Analysis snippet execution
//!
//! This crate runs the small analysis snippets generated for each plan step:
//! - Table: CSV-backed tables, statistics and dataset discovery
//! - Interp: a restricted pandas-flavoured language with no ambient I/O
//! - Executor: in-process and isolated-process execution with a shared
//!   result shape, truncation and hard timeouts

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod executor;
pub mod interp;
pub mod output;
pub mod table;

pub use error::{Error, Result};
pub use executor::{
    worker, Executor, InProcessExecutor, IsolatedExecutor, NetworkMode, ResourceLimits,
    SandboxConfig, SandboxExecutor, SandboxMode, WorkerRuntime,
};
pub use output::{ExecutionRequest, ExecutionResult, MAX_RESULT_CHARS};
pub use table::{discover_csv, load_datasets, Cell, Column, DatasetFile, Datasets, Table};
