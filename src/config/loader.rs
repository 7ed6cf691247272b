//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read configuration file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse configuration file {}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error("invalid build arguments: {0}")]
    BuildArgs(#[from] shell_words::ParseError),

    #[error("unable to load environment file {}: {reason}", path.display())]
    Env { path: PathBuf, reason: String },
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate a gateway configuration file.
///
/// Files ending in `.toml` are read as TOML, everything else as JSON.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let parsed = if is_toml {
        toml::from_str::<ProxyConfig>(&content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str::<ProxyConfig>(&content).map_err(|e| e.to_string())
    };
    let config = parsed.map_err(|reason| ConfigError::Parse {
        path: path.to_path_buf(),
        reason,
    })?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Split a shell-style argument string (`-tags "a b" -race`).
pub fn parse_build_args(raw: &str) -> Result<Vec<String>, ConfigError> {
    Ok(shell_words::split(raw)?)
}
