//! Configuration for the manifest generator
//!
//! Settings are resolved in this order, later sources winning:
//! 1. Default values
//! 2. Configuration file (TOML format)
//! 3. Environment variables
//!
//! Command line flags are applied on top by the CLI.

use crate::logging::LoggingConfig;
use crate::output::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Where and how manifests are written
    pub output: OutputConfig,
    /// Vendored operator CRDs
    pub crds: CrdConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the generated tree, e.g. `resources`
    pub root_dir: PathBuf,
    /// Encoding of written manifests
    pub format: OutputFormat,
}

/// Local directories holding operator CRD manifests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrdConfig {
    pub thanos_dir: PathBuf,
    pub loki_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("resources"),
            format: OutputFormat::Yaml,
        }
    }
}

impl Default for CrdConfig {
    fn default() -> Self {
        Self {
            thanos_dir: PathBuf::from("crds/thanos-operator"),
            loki_dir: PathBuf::from("crds/loki-operator"),
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from `path`, or from the first standard location
    /// that exists, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::find_config_file() {
                Some(found) => Self::load_from_file(&found)?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            std::env::var("RHOBS_CONFIG").ok().map(PathBuf::from),
            Some(PathBuf::from("./rhobs.toml")),
            Some(PathBuf::from("/etc/rhobs/config.toml")),
        ];

        paths.into_iter().flatten().find(|p| p.exists())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup
    ///
    /// A value that does not parse is an error, not a fallback to the
    /// previous setting.
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Output
        if let Some(dir) = var("RHOBS_OUTPUT_DIR") {
            self.output.root_dir = PathBuf::from(dir);
        }
        if let Some(format) = var("RHOBS_OUTPUT_FORMAT") {
            self.output.format = format
                .parse()
                .map_err(|e| ConfigError::Env("RHOBS_OUTPUT_FORMAT", format!("{e}")))?;
        }

        // CRDs
        if let Some(dir) = var("RHOBS_THANOS_CRDS_DIR") {
            self.crds.thanos_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("RHOBS_LOKI_CRDS_DIR") {
            self.crds.loki_dir = PathBuf::from(dir);
        }

        // Logging
        if let Some(level) = var("RHOBS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(dir) = var("RHOBS_LOG_DIR") {
            self.logging.log_dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> Result<String, ConfigError> {
        let config = Self::default();
        toml::to_string_pretty(&config).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.root_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "Output root directory cannot be empty".to_string(),
            ));
        }

        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown log level '{}'",
                self.logging.level
            )));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0:?}: {1}")]
    FileRead(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {0}: {1}")]
    Env(&'static str, String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Config validation failed: {0}")]
    Validation(String),
}

impl From<ConfigError> for rhobs_common::Error {
    fn from(err: ConfigError) -> Self {
        rhobs_common::Error::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GeneratorConfig::default();
        assert_eq!(config.output.root_dir, PathBuf::from("resources"));
        assert_eq!(config.output.format, OutputFormat::Yaml);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = GeneratorConfig::default();
        config.output.root_dir = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = GeneratorConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_generate_sample_config() {
        let sample = GeneratorConfig::generate_sample().unwrap();
        assert!(sample.contains("[output]"));
        assert!(sample.contains("[crds]"));
        assert!(sample.contains("[logging]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\nformat = \"json\"").unwrap();

        let config = GeneratorConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.root_dir, PathBuf::from("resources"));
        assert_eq!(config.crds, CrdConfig::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = GeneratorConfig::load_from_file(Path::new("/nonexistent/rhobs.toml"));
        assert!(matches!(err, Err(ConfigError::FileRead(_, _))));
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("RHOBS_OUTPUT_DIR", "/tmp/out"),
            ("RHOBS_THANOS_CRDS_DIR", "/vendor/thanos"),
            ("RHOBS_LOG_LEVEL", "debug"),
            ("RHOBS_OUTPUT_FORMAT", "JSON"),
        ]);

        let mut config = GeneratorConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.output.root_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.crds.thanos_dir, PathBuf::from("/vendor/thanos"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_unknown_output_format_is_rejected() {
        let mut config = GeneratorConfig::default();
        let err = config
            .apply_overrides(|key| (key == "RHOBS_OUTPUT_FORMAT").then(|| "jsn".to_string()))
            .unwrap_err();

        assert!(matches!(err, ConfigError::Env("RHOBS_OUTPUT_FORMAT", _)));
        assert!(err.to_string().contains("jsn"));
        assert_eq!(config.output.format, OutputFormat::Yaml);
    }
}
