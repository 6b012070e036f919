use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments; each override wins over the configuration file.
#[derive(Debug, Parser)]
#[command(
    name = "lazygallery",
    version,
    about = "Progressively load an image gallery and shuffle through its population",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", env = "LAZYGALLERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", env = "LAZYGALLERY_LOG_PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Discovery service base URL.
    #[arg(long, value_name = "URL", env = "LAZYGALLERY_BASE_URL")]
    pub base_url: Option<String>,

    /// Extension of images addressed by population index.
    #[arg(long, value_name = "EXT")]
    pub image_extension: Option<String>,

    /// Maximum age of the cached listing, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub cache_ttl_ms: Option<u64>,

    /// Draw budget per random selection.
    #[arg(long, value_name = "N")]
    pub max_random_attempts: Option<u32>,

    /// Random selections to perform once loading settles.
    #[arg(short, long, value_name = "N", default_value_t = 3)]
    pub shuffles: u32,
}
