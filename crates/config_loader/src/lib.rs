//! # Config Loader
//!
//! Builds the immutable [`NotifierBlueprint`] the service runs from.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Overlay `NOTIFIER_*` environment variables
//! - Validate the result
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("notifier.toml")).unwrap();
//! println!("sinks: {}", blueprint.sinks.len());
//! ```

pub mod env;
mod parser;
mod validator;

pub use contracts::NotifierBlueprint;
pub use env::apply_env_overrides;
pub use parser::ConfigFormat;
pub use validator::validate;

use contracts::ContractError;
use std::path::Path;
use tracing::{debug, info};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    ///
    /// Format is taken from the extension (.toml / .json).
    ///
    /// # Errors
    /// Read failure, unsupported format, parse or validation failure.
    pub fn load_from_path(path: &Path) -> Result<NotifierBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| ContractError::ConfigParse {
            message: format!("cannot read '{}': {e}", path.display()),
            source: Some(Box::new(e)),
        })?;
        let blueprint = Self::load_from_str(&content, format)?;
        info!(path = %path.display(), sinks = blueprint.sinks.len(), "Configuration loaded");
        Ok(blueprint)
    }

    /// Load configuration from a string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<NotifierBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Load an optional file, overlay the process environment, validate
    ///
    /// Without a file the defaults are the base.
    pub fn load(path: Option<&Path>) -> Result<NotifierBlueprint, ContractError> {
        Self::load_with_vars(path, std::env::vars())
    }

    /// Same as [`ConfigLoader::load`] with explicit variables
    pub fn load_with_vars<I, K, V>(
        path: Option<&Path>,
        vars: I,
    ) -> Result<NotifierBlueprint, ContractError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut blueprint = match path {
            Some(path) => {
                let format = ConfigFormat::from_path(path)?;
                let content =
                    std::fs::read_to_string(path).map_err(|e| ContractError::ConfigParse {
                        message: format!("cannot read '{}': {e}", path.display()),
                        source: Some(Box::new(e)),
                    })?;
                parser::parse(&content, format)?
            }
            None => NotifierBlueprint::default(),
        };

        let applied = apply_env_overrides(&mut blueprint, vars)?;
        validate(&blueprint)?;
        debug!(
            file = path.map(|p| p.display().to_string()),
            env_overrides = applied.len(),
            "Configuration resolved"
        );
        Ok(blueprint)
    }

    /// Defaults plus the process environment
    pub fn from_env() -> Result<NotifierBlueprint, ContractError> {
        Self::load(None)
    }

    /// Serialize to TOML
    pub fn to_toml(blueprint: &NotifierBlueprint) -> Result<String, ContractError> {
        parser::render(blueprint, ConfigFormat::Toml)
    }

    /// Serialize to JSON
    pub fn to_json(blueprint: &NotifierBlueprint) -> Result<String, ContractError> {
        parser::render(blueprint, ConfigFormat::Json)
    }
}
