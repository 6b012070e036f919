//! Locating, seeding, and validating the gallery configuration file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use super::app_config::AppConfig;

/// Failure to produce a usable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No override was given and the platform has no config directory.
    #[error("failed to determine config file location")]
    PathNotFound,

    /// Reading the file or seeding the default failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The default configuration could not be rendered as TOML.
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// The file parsed but holds settings the gallery cannot run with.
    #[error("invalid [{section}] settings: {reason}")]
    Invalid {
        /// Offending TOML section.
        section: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    /// Builds an `Invalid` error for `section`.
    pub fn invalid(section: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Invalid {
            section,
            reason: reason.to_string(),
        }
    }
}

/// The configuration file backing one run.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Resolves the file from an explicit override or the platform default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::PathNotFound` if neither is available.
    pub fn new(path_override: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path_override
            .map(Path::to_path_buf)
            .or_else(AppConfig::default_config_path)
            .ok_or(ConfigError::PathNotFound)?;
        Ok(Self { path })
    }

    /// Uses `path` as the configuration file.
    #[must_use]
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Location of the configuration file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration.
    ///
    /// A missing file is seeded with defaults. A file that does not parse is
    /// left untouched and defaults are used. A file that parses but fails
    /// validation is an error, so contradictory tunables never reach the loader.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or seeded, or if its
    /// settings are invalid.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "Config file not found, writing defaults");
                let config = AppConfig::default();
                self.seed(&config)?;
                return Ok(config);
            }
            Err(e) => return Err(e.into()),
        };

        let config = match toml::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unparseable config, using defaults");
                return Ok(AppConfig::default());
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn seed(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(config)?;
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
