//! # Configuration
//!
//! Settings read from `modelgraph.toml`:
//!
//! ```toml
//! [limits]
//! max_node_count = 1000000
//! max_array_length = 16777216
//!
//! [logging]
//! format = "json"
//! filter = "modelgraph=debug"
//! ```
//!
//! Every key is optional. Command-line flags override file values, and
//! `MODELGRAPH_LOG_FORMAT` / `RUST_LOG` override the `[logging]` table.

use modelgraph_core::{GraphError, Limits};
use serde::Deserialize;
use std::path::Path;

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "modelgraph.toml";

/// Filter used when neither `RUST_LOG` nor the config file names one.
pub const DEFAULT_LOG_FILTER: &str = "modelgraph=info,modelgraph_core=info";

/// Filter used by `--verbose`.
pub const VERBOSE_LOG_FILTER: &str = "modelgraph=debug,modelgraph_core=debug";

/// Maximum configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// CONFIG TYPES
// =============================================================================

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse an environment value; anything unrecognised is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// The `[logging]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub filter: Option<String>,
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub limits: Limits,
    pub logging: LoggingConfig,
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Parse configuration text.
    pub fn from_toml(text: &str) -> Result<Self, GraphError> {
        toml::from_str(text)
            .map_err(|e| GraphError::SerializationError(format!("Invalid configuration: {}", e)))
    }

    /// Load `explicit` if given, else `modelgraph.toml` in the working
    /// directory if present, else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, GraphError> {
        match explicit {
            Some(path) => Self::read(path),
            None => {
                let candidate = Path::new(DEFAULT_CONFIG_FILE);
                if candidate.is_file() {
                    Self::read(candidate)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self, GraphError> {
        if !path.is_file() {
            return Err(GraphError::FileNotFound {
                name: "configuration".to_string(),
                path: path.to_path_buf(),
            });
        }
        let size = std::fs::metadata(path)?.len();
        if size > MAX_CONFIG_FILE_SIZE {
            return Err(GraphError::LimitExceeded {
                what: "configuration file size",
                value: size,
                limit: MAX_CONFIG_FILE_SIZE,
            });
        }
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Apply command-line limit overrides.
    #[must_use]
    pub fn with_overrides(mut self, max_node_count: Option<u32>, max_array_length: Option<u32>) -> Self {
        if let Some(count) = max_node_count {
            self.limits.max_node_count = count;
        }
        if let Some(length) = max_array_length {
            self.limits.max_array_length = length;
        }
        self
    }

    /// Log filter from the file, or the default for the verbosity.
    pub fn log_filter(&self, verbose: bool) -> &str {
        match &self.logging.filter {
            Some(filter) => filter,
            None if verbose => VERBOSE_LOG_FILTER,
            None => DEFAULT_LOG_FILTER,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = Config::from_toml("[limits]\nmax_node_count = 10\n").unwrap();
        assert_eq!(config.limits.max_node_count, 10);
        assert_eq!(
            config.limits.max_array_length,
            Limits::default().max_array_length
        );
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn logging_table() {
        let config =
            Config::from_toml("[logging]\nformat = \"json\"\nfilter = \"modelgraph=trace\"\n")
                .unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.log_filter(true), "modelgraph=trace");
    }

    #[test]
    fn unknown_tables_are_rejected() {
        let err = Config::from_toml("[limit]\nmax_node_count = 3\n").unwrap_err();
        assert!(matches!(err, GraphError::SerializationError(_)));
    }

    #[test]
    fn flags_override_file_values() {
        let config = Config::from_toml("[limits]\nmax_node_count = 10\nmax_array_length = 20\n")
            .unwrap()
            .with_overrides(Some(5), None);
        assert_eq!(config.limits.max_node_count, 5);
        assert_eq!(config.limits.max_array_length, 20);
    }

    #[test]
    fn default_filter_follows_verbosity() {
        let config = Config::default();
        assert_eq!(config.log_filter(false), DEFAULT_LOG_FILTER);
        assert_eq!(config.log_filter(true), VERBOSE_LOG_FILTER);
    }

    #[test]
    fn log_format_from_environment_value() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" text "), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("yaml"), None);
    }

    #[test]
    fn explicit_missing_file_is_reported() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("absent.toml");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, GraphError::FileNotFound { .. }));
    }

    #[test]
    fn explicit_file_is_read() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("modelgraph.toml");
        std::fs::write(&path, "[limits]\nmax_array_length = 64\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.limits.max_array_length, 64);
    }
}
