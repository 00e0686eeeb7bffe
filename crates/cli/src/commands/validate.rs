//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::StreamerConfig;
use contracts::EndTimestampMode;
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::ValidateArgs;

#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    default_timeout_ms: u64,
    stop_signal_ttl_secs: u64,
    queue_capacity: usize,
    buffer_threshold: usize,
    end_timestamp: EndTimestampMode,
}

pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_config(Some(&args.config)) {
        Ok(config) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&config),
            summary: Some(ConfigSummary {
                default_timeout_ms: config.session.default_timeout_ms,
                stop_signal_ttl_secs: config.session.stop_signal_ttl_secs,
                queue_capacity: config.session.queue_capacity,
                buffer_threshold: config.dispatch.buffer_threshold,
                end_timestamp: config.dispatch.end_timestamp,
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Non-fatal issues
fn collect_warnings(config: &StreamerConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.session.default_timeout().is_none() {
        warnings.push(
            "session.default_timeout_ms is 0 - channels opened with the default never time out"
                .to_string(),
        );
    }

    if config.dispatch.buffer_threshold < 16 {
        warnings.push(format!(
            "dispatch.buffer_threshold is {} bytes - buffered dispatch flushes almost every item",
            config.dispatch.buffer_threshold
        ));
    }

    if config.typewriter.letter_delay_ms > config.typewriter.default_interval_ms {
        warnings.push(
            "typewriter.letter_delay_ms exceeds default_interval_ms - letters type slower than punctuation"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Default timeout: {} ms", summary.default_timeout_ms);
            println!("  Stop signal TTL: {} s", summary.stop_signal_ttl_secs);
            println!("  Queue capacity: {}", summary.queue_capacity);
            println!("  Buffer threshold: {} bytes", summary.buffer_threshold);
            println!("  End timestamp: {:?}", summary.end_timestamp);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn args(config: PathBuf) -> ValidateArgs {
        ValidateArgs {
            config,
            json: false,
        }
    }

    #[test]
    fn test_valid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[dispatch]\nbuffer_threshold = 8").unwrap();

        let result = validate_config(&args(file.path().to_path_buf()));

        assert!(result.valid);
        assert_eq!(result.summary.unwrap().buffer_threshold, 8);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&args(PathBuf::from("/nonexistent/streamer.toml")));

        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_out_of_range_value() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"session": {{"stop_signal_ttl_secs": 0}}}}"#).unwrap();

        let result = validate_config(&args(file.path().to_path_buf()));

        assert!(!result.valid);
        assert!(result.summary.is_none());
    }
}
