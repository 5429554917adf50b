//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_hub;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::HubBlueprint;

/// Load `path`, or the built-in defaults when no path is given
pub(crate) fn load_blueprint(path: Option<&Path>) -> Result<HubBlueprint> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("Configuration file not found: {}", path.display());
        }
    }
    config_loader::ConfigLoader::load_or_default(path).with_context(|| match path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Built-in defaults are invalid".to_string(),
    })
}
