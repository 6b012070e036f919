//! Application configuration.

/// Configuration file schema and validation.
pub mod app_config;
/// Command-line arguments.
pub mod args;
/// Configuration file location and loading.
pub mod storage;

pub use app_config::{AppConfig, DiscoveryConfig, LogLevel};
pub use args::CliArgs;
pub use storage::{ConfigError, ConfigStore};
