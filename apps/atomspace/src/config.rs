//! # Configuration
//!
//! Optional TOML file, merged with CLI flags and environment:
//! CLI flag > environment > file > default.
//!
//! ```toml
//! [persistence]
//! progress_interval = 50000
//!
//! [logging]
//! format = "json"
//! ```

use atomspace_core::PersistError;
use atomspace_core::primitives::DEFAULT_PROGRESS_INTERVAL;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "atomspace.toml";

/// Environment variable selecting the log format.
pub const LOG_FORMAT_ENV: &str = "ATOMSPACE_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistenceSection {
    pub progress_interval: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub format: Option<LogFormat>,
}

/// Contents of the TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub persistence: PersistenceSection,
    pub logging: LoggingSection,
}

impl FileConfig {
    /// Parse a config document.
    pub fn parse(text: &str) -> Result<Self, PersistError> {
        toml::from_str(text)
            .map_err(|e| PersistError::invalid_usage(format!("invalid config: {}", e)))
    }

    /// Read `explicit`, or [`DEFAULT_CONFIG_FILE`] if present, or nothing.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, PersistError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|e| {
            PersistError::invalid_usage(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }
}

/// Effective settings after merging every source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub progress_interval: u64,
    pub log_format: LogFormat,
}

impl Settings {
    pub fn resolve(
        file: &FileConfig,
        cli_progress_interval: Option<u64>,
        env_log_format: Option<&str>,
    ) -> Self {
        let progress_interval = cli_progress_interval
            .or(file.persistence.progress_interval)
            .unwrap_or(DEFAULT_PROGRESS_INTERVAL);
        let log_format = env_log_format
            .and_then(LogFormat::parse)
            .or(file.logging.format)
            .unwrap_or_default();
        Self {
            progress_interval,
            log_format,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(&FileConfig::default(), None, None)
    }
}
