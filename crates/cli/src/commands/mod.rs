//! Command implementations.

mod demo;
mod info;
mod validate;

pub use demo::run_demo;
pub use info::run_info;
pub use validate::run_validate;

use std::path::Path;

use config_loader::{ConfigLoader, StreamerConfig};

use crate::error::{CliError, Result};

/// Load `path` when given, defaults otherwise
fn load_config(path: Option<&Path>) -> Result<StreamerConfig> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(CliError::config_not_found(path.display().to_string()));
        }
    }
    Ok(ConfigLoader::load_or_default(path)?)
}
