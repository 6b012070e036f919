//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::args::CliArgs;
use super::storage::ConfigError;
use crate::application::GalleryConfig;
use crate::infrastructure::image::FetcherConfig;

const APP_NAME: &str = "lazygallery";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Discovery service connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Service base URL.
    pub base_url: String,
    /// Extension of images addressed by population index.
    pub image_extension: String,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Upper limit for range detection probes.
    pub range_ceiling: u64,
    /// Timeout for each range detection probe, in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            image_extension: "jpg".to_string(),
            request_timeout_secs: 30,
            range_ceiling: 100_000,
            probe_timeout_ms: 2000,
        }
    }
}

/// Application configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Gallery loading and selection tunables.
    #[serde(default)]
    pub gallery: GalleryConfig,

    /// Discovery service settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Image warm cache settings.
    #[serde(default)]
    pub fetch: FetcherConfig,
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(base_url) = &args.base_url {
            self.discovery.base_url.clone_from(base_url);
        }
        if let Some(extension) = &args.image_extension {
            self.discovery.image_extension.clone_from(extension);
        }
        if let Some(ttl) = args.cache_ttl_ms {
            self.gallery.cache_ttl_ms = ttl;
        }
        if let Some(attempts) = args.max_random_attempts {
            self.gallery.max_random_attempts = attempts;
        }
    }

    /// Default configuration file location under the platform config directory.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Rejects settings the gallery cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the offending section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gallery
            .validate()
            .map_err(|e| ConfigError::invalid("gallery", e))?;

        let url = reqwest::Url::parse(&self.discovery.base_url)
            .map_err(|e| ConfigError::invalid("discovery", format!("base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "discovery",
                format!("base_url scheme {} is not http or https", url.scheme()),
            ));
        }
        if self.discovery.image_extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::invalid("discovery", "image_extension is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use test_case::test_case;

    #[test]
    fn test_parse_sections() {
        let toml_content = r#"
            log_level = "debug"

            [gallery]
            initial_batch_size = 10
            cache_ttl_ms = 60000

            [discovery]
            base_url = "https://img.example.com"
            image_extension = "webp"

            [fetch]
            cache_size = 8
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.gallery.initial_batch_size, 10);
        assert_eq!(config.gallery.second_batch_size, 25);
        assert_eq!(config.gallery.cache_ttl_ms, 60_000);
        assert_eq!(config.discovery.base_url, "https://img.example.com");
        assert_eq!(config.discovery.image_extension, "webp");
        assert_eq!(config.discovery.range_ceiling, 100_000);
        assert_eq!(config.fetch.cache_size, 8);
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.gallery, GalleryConfig::default());
        assert_eq!(config.discovery.image_extension, "jpg");
        assert!(config.config.is_none());
    }

    #[test]
    fn test_args_override_file_values() {
        let mut config: AppConfig = toml::from_str(
            r#"
            [discovery]
            base_url = "https://from-file.example.com"
            "#,
        )
        .unwrap();

        let args = CliArgs::parse_from([
            "lazygallery",
            "--base-url",
            "https://from-cli.example.com",
            "--log-level",
            "trace",
            "--max-random-attempts",
            "5",
        ]);
        config.merge_with_args(&args);

        assert_eq!(config.discovery.base_url, "https://from-cli.example.com");
        assert_eq!(config.log_level, LogLevel::Trace);
        assert_eq!(config.gallery.max_random_attempts, 5);
        assert_eq!(config.gallery.cache_ttl_ms, 300_000);
    }

    #[test]
    fn test_cli_override_is_validated() {
        let mut config = AppConfig::default();
        config.merge_with_args(&CliArgs::parse_from([
            "lazygallery",
            "--max-random-attempts",
            "0",
        ]));

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { section: "gallery", .. }));
        assert!(err.to_string().contains("max_random_attempts"));
    }

    #[test_case("not a url" ; "unparseable")]
    #[test_case("ftp://img.example.com" ; "wrong scheme")]
    fn test_rejects_unusable_base_url(base_url: &str) {
        let mut config = AppConfig::default();
        config.discovery.base_url = base_url.to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { section: "discovery", .. })
        ));
    }

    #[test]
    fn test_rejects_empty_extension() {
        let mut config = AppConfig::default();
        config.discovery.image_extension = ".".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_display_round_trips_through_toml() {
        for level in [LogLevel::Trace, LogLevel::Warn, LogLevel::Error] {
            let parsed: AppConfig = toml::from_str(&format!("log_level = \"{level}\"")).unwrap();
            assert_eq!(parsed.log_level, level);
        }
    }
}
