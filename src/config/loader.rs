//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for the schema.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The parsed config failed semantic validation.
    #[error("invalid configuration: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> ConfigResult<ServerConfig> {
    let content = fs::read_to_string(path)?;
    from_toml_str(&content)
}

/// Parse and validate configuration from TOML text.
pub fn from_toml_str(content: &str) -> ConfigResult<ServerConfig> {
    let config: ServerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
