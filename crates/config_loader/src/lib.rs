//! # Config Loader
//!
//! Turns a TOML or JSON file into a validated [`HubBlueprint`]: the listen
//! socket and session policy, the ingestion retry policy and the endpoints of
//! the two SPU channels and the PLC.
//!
//! Sections and fields may be omitted; omitted values take the hub defaults
//! (`0.0.0.0:8888`, text encoding, 5 s staleness). Validation runs on every
//! load path, including the defaults.
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use contracts::SourceId;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("hub.toml")).unwrap();
//! println!("listening on {}", blueprint.server.listen_addr);
//! for source in SourceId::ALL {
//!     println!("{} -> {}", source, blueprint.sources.get(source).endpoint);
//! }
//! ```

mod parser;
mod validator;

pub use contracts::HubBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Hub configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a hub configuration file, format chosen by extension (.toml / .json)
    ///
    /// # Errors
    /// Unreadable file, unknown extension, parse failure, or a value the hub
    /// cannot run with (bad listen address, inverted interval range, ...).
    pub fn load_from_path(path: &Path) -> Result<HubBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load `path` if given, otherwise the validated built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<HubBlueprint, ContractError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => {
                let blueprint = HubBlueprint::default();
                validator::validate(&blueprint)?;
                Ok(blueprint)
            }
        }
    }

    /// Parse and validate configuration text
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<HubBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Re-check a blueprint after command-line overrides were applied
    pub fn validate(blueprint: &HubBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(blueprint: &HubBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Render the effective configuration as JSON
    pub fn to_json(blueprint: &HubBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse(format!(
                "{}: cannot tell TOML from JSON without a file extension",
                path.display()
            ))
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}
