//! Logging configuration module
//! Console output on stderr with an optional JSON log file

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for the rotated log file, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    /// Use JSON formatting on the console as well
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Initialize the global subscriber.
    ///
    /// The returned guard flushes the file writer on drop and must be held
    /// for the life of the process.
    pub fn init(&self) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
        let env_filter =
            EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&self.level))?;

        let console_layer = if self.json_format {
            fmt::layer().json().with_writer(io::stderr).boxed()
        } else {
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_ansi(true)
                .with_writer(io::stderr)
                .boxed()
        };

        let (file_layer, guard) = match self.log_dir {
            Some(ref dir) => {
                let (writer, guard) = non_blocking(rolling::daily(dir, "rhobs.log"));
                let layer = fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .json()
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::debug!("Logging initialized - level: {}", self.level);

        Ok(guard)
    }

    /// Level for a `-v` count given on the command line
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        self.level = match verbose {
            0 => return self,
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.log_dir.is_none());
        assert!(!config.json_format);
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(LoggingConfig::default().with_verbosity(0).level, "info");
        assert_eq!(LoggingConfig::default().with_verbosity(1).level, "debug");
        assert_eq!(LoggingConfig::default().with_verbosity(3).level, "trace");
    }
}
