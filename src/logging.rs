//! Logging setup with optional file rotation and JSON output
//!
//! Records go to stderr so stdout stays free for event output. A log file,
//! when configured, is rotated daily.

use crate::config::LoggingConfig;
use crate::error::{DefluxError, Result};
use std::path::PathBuf;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    EnvFilter, Layer, Registry,
};

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Filter directives, e.g. "info" or "deflux=debug,warn"
    pub directives: String,

    /// Log to file
    pub file_path: Option<PathBuf>,

    /// Log to stderr
    pub stderr: bool,

    /// Emit JSON records
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directives: "info".to_string(),
            file_path: None,
            stderr: true,
            json: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Start from the configuration file settings
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        Self {
            directives: settings.level.clone(),
            file_path: settings.file.clone(),
            stderr: true,
            json: settings.json,
        }
    }

    /// Apply `RUST_LOG`, `DEFLUX_LOG_FILE`, `DEFLUX_LOG_STDERR` and
    /// `DEFLUX_LOG_JSON`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            if !rust_log.trim().is_empty() {
                self.directives = rust_log;
            }
        }

        if let Ok(log_file) = std::env::var("DEFLUX_LOG_FILE") {
            self.file_path = Some(PathBuf::from(log_file));
        }

        if let Ok(log_stderr) = std::env::var("DEFLUX_LOG_STDERR") {
            self.stderr = log_stderr.to_lowercase() != "false";
        }

        if let Ok(json) = std::env::var("DEFLUX_LOG_JSON") {
            self.json = matches!(json.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        self
    }
}

fn output_layer<W>(writer: W, ansi: bool, json: bool) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_level(true);

    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Initialize logging with the given configuration
pub fn init_logging(config: LogConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&config.directives).map_err(|e| {
        DefluxError::config(format!("Invalid log filter {:?}: {e}", config.directives))
    })?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.stderr {
        layers.push(output_layer(std::io::stderr, !config.json, config.json));
    }

    if let Some(file_path) = &config.file_path {
        // Ensure parent directory exists
        let directory = file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&directory)?;

        let file_name = file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "deflux.log".into());

        let file_appender = tracing_appender::rolling::daily(directory, file_name);
        layers.push(output_layer(file_appender, false, config.json));
    }

    let subscriber = tracing_subscriber::registry().with(layers).with(env_filter);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| DefluxError::config(format!("Logging already initialized: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_overrides() {
        temp_env::with_vars(
            [
                ("RUST_LOG", Some("deflux=trace")),
                ("DEFLUX_LOG_FILE", Some("/tmp/deflux/deflux.log")),
                ("DEFLUX_LOG_JSON", Some("true")),
                ("DEFLUX_LOG_STDERR", None),
            ],
            || {
                let config = LogConfig::from_env();
                assert_eq!(config.directives, "deflux=trace");
                assert_eq!(
                    config.file_path,
                    Some(PathBuf::from("/tmp/deflux/deflux.log"))
                );
                assert!(config.json);
                assert!(config.stderr);
            },
        );
    }

    #[test]
    #[serial]
    fn test_settings_used_without_env() {
        temp_env::with_vars_unset(
            ["RUST_LOG", "DEFLUX_LOG_FILE", "DEFLUX_LOG_JSON", "DEFLUX_LOG_STDERR"],
            || {
                let settings = LoggingConfig {
                    level: "warn".to_string(),
                    file: None,
                    json: false,
                };
                let config = LogConfig::from_settings(&settings).with_env_overrides();
                assert_eq!(config.directives, "warn");
                assert!(config.file_path.is_none());
            },
        );
    }
}
