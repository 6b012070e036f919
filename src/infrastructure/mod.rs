//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Discovery service client.
pub mod discovery;
/// Image fetching and warm caching.
pub mod image;
/// Session store and clock adapters.
pub mod session;

pub use config::{AppConfig, CliArgs, ConfigError, ConfigStore, DiscoveryConfig, LogLevel};
pub use discovery::HttpDiscoveryClient;
pub use image::{CacheStats, FetcherConfig, HttpImageFetcher, WarmCache};
pub use session::{MemorySessionStore, SystemClock};
