//! Environment bootstrap for the build and the supervised process.
//!
//! Variables come from an optional `.env` file plus the app port. They are
//! handed to child processes explicitly instead of mutating the parent's
//! environment.

use std::path::Path;

use crate::config::loader::ConfigError;

/// Name of the dotfile read from the working directory.
pub const ENV_FILE: &str = ".env";

/// Variable the supervised process reads its listen port from.
pub const PORT_VAR: &str = "PORT";

/// Read `KEY=value` pairs from `<dir>/.env`. A missing file yields no pairs.
pub fn load_env_file(dir: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    let path = dir.join(ENV_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let iter = dotenvy::from_path_iter(&path).map_err(|e| ConfigError::Env {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    iter.map(|item| {
        item.map_err(|e| ConfigError::Env {
            path: path.clone(),
            reason: e.to_string(),
        })
    })
    .collect()
}

/// Dotfile variables followed by the app port, for child processes.
pub fn child_environment(
    dir: &Path,
    app_port: u16,
) -> Result<Vec<(String, String)>, ConfigError> {
    let mut vars = load_env_file(dir)?;
    vars.retain(|(key, _)| key != PORT_VAR);
    vars.push((PORT_VAR.to_string(), app_port.to_string()));
    Ok(vars)
}
