//! Application wiring
//!
//! - `config`: configuration types
//! - `loader`: layered configuration loading
//! - `init`: builds the registry, provider and orchestrator from configuration

pub mod config;
pub mod init;
pub mod loader;

pub use config::AppConfig;
pub use loader::load_config;
