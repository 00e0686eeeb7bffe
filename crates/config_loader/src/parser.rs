//! Configuration parsing
//!
//! TOML is the primary format, JSON is accepted too.

use contracts::{ContractError, StreamerConfig};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<StreamerConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<StreamerConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<StreamerConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::EndTimestampMode;

    #[test]
    fn test_parse_toml_partial() {
        let content = r#"
[session]
stop_signal_ttl_secs = 30

[dispatch]
end_timestamp = "live"
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.session.stop_signal_ttl_secs, 30);
        assert_eq!(config.session.queue_capacity, 32);
        assert_eq!(config.dispatch.end_timestamp, EndTimestampMode::Live);
        assert_eq!(config.dispatch.buffer_threshold, 1024);
    }

    #[test]
    fn test_parse_empty_toml() {
        let config = parse_toml("").unwrap();
        assert_eq!(config, StreamerConfig::default());
    }

    #[test]
    fn test_parse_json() {
        let content = r#"{ "dispatch": { "buffer_threshold": 64 } }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.dispatch.buffer_threshold, 64);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_end_timestamp_rejected() {
        let err = parse_toml("[dispatch]\nend_timestamp = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
