//! # Config Loader
//!
//! Configuration loading and parsing.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration ranges
//! - Produce a `StreamerConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("streamer.toml")).unwrap();
//! println!("stop ttl: {:?}", config.session.stop_signal_ttl());
//! ```

mod parser;
mod validator;

pub use contracts::StreamerConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file path
    ///
    /// The format is detected from the extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<StreamerConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from a string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<StreamerConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<StreamerConfig, ContractError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Ok(StreamerConfig::default()),
        }
    }

    pub fn to_toml(config: &StreamerConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(config: &StreamerConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_TOML: &str = r#"
[session]
default_timeout_ms = 60000
stop_signal_ttl_secs = 10
queue_capacity = 8

[dispatch]
buffer_threshold = 100

[typewriter]
default_interval_ms = 5
"#;

    #[test]
    fn test_load_from_str_toml() {
        let config = ConfigLoader::load_from_str(SAMPLE_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(config.session.default_timeout_ms, 60000);
        assert_eq!(config.dispatch.buffer_threshold, 100);
        assert_eq!(config.typewriter.default_interval_ms, 5);
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(SAMPLE_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let again = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_toml_to_json() {
        let config = ConfigLoader::load_from_str(SAMPLE_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let again = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = "[session]\nqueue_capacity = 0\n";
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("session.queue_capacity"));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE_TOML.as_bytes()).unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.session.stop_signal_ttl_secs, 10);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_load_or_default() {
        let config = ConfigLoader::load_or_default(None).unwrap();
        assert_eq!(config, StreamerConfig::default());
    }
}
