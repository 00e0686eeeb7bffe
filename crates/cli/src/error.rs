//! Error types for CLI operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Invalid demo setup: {message}")]
    DemoSetup { message: String },

    #[error("Metrics exporter failed: {0}")]
    Metrics(#[source] anyhow::Error),

    #[error(transparent)]
    Contract(#[from] contracts::ContractError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn demo_setup(message: impl Into<String>) -> Self {
        Self::DemoSetup {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
