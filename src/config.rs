//! Configuration loading for the analyzer.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analyzer::log_parser::DEFAULT_TAG;

/// File name looked up next to the receive log when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "ranger.toml";

/// Top-level analyzer configuration. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    pub parser: ParserConfig,
    pub export: ExportConfig,
}

/// Log line parsing options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Literal marker preceding the record fields
    pub tag: String,
    /// Warn about and skip malformed records instead of aborting
    pub skip_malformed: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            tag: DEFAULT_TAG.to_string(),
            skip_malformed: false,
        }
    }
}

/// CSV export options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Bytes of the length field in variable packet length mode
    pub length_field_bytes: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { length_field_bytes: 1 }
    }
}

impl AnalyzerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `config_path` - Path to the TOML file
    ///
    /// # Returns
    /// * `Ok(AnalyzerConfig)` if the file was successfully loaded and parsed
    /// * `Err(String)` with a descriptive error message otherwise
    pub fn load(config_path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(config_path).map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: Self = toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Derive the default config path from the receive log path.
    ///
    /// Replaces the log filename with `ranger.toml` in the same directory.
    pub fn config_path_for_log(log_path: &Path) -> PathBuf {
        log_path.parent().unwrap_or(Path::new(".")).join(DEFAULT_CONFIG_FILE)
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Without one, `ranger.toml` beside the receive
    /// log is used when present, and built-in defaults otherwise.
    pub fn resolve(explicit: Option<&Path>, rx_log: &Path) -> Result<Self, String> {
        if let Some(path) = explicit {
            log::info!("Loading configuration from {}", path.display());
            return Self::load(path);
        }

        let implicit = Self::config_path_for_log(rx_log);
        if implicit.is_file() {
            log::info!("Loading configuration from {}", implicit.display());
            Self::load(&implicit)
        } else {
            log::debug!("No {} found, using defaults", implicit.display());
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.parser.tag.is_empty() {
            return Err("parser.tag must not be empty".to_string());
        }
        Ok(())
    }
}
