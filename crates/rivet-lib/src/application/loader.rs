//! Configuration loading
//!
//! Coordinates the configuration layers for one invocation.

use super::config::{ConfigOverlay, RivetConfig, defaults};
use super::env::EnvironmentConfig;
use crate::primitives::ConfigError;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, trace};

impl RivetConfig {
    /// Load config for the current directory and process environment
    pub fn load() -> Result<Self, ConfigError> {
        let workdir = std::env::current_dir().map_err(|source| ConfigError::FileReadError {
            file: ".".to_string(),
            source,
        })?;
        Self::load_from(&workdir, std::env::vars())
    }

    /// Load config: defaults -> `rivet.toml` -> `.env` -> environment.
    ///
    /// Both files are optional and looked up in `workdir`. Variables in
    /// `vars` win over the same names in `.env`.
    pub fn load_from<I>(workdir: &Path, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        // 1. Defaults
        let mut config = Self::default();

        // 2. Project file
        let file = workdir.join(defaults::CONFIG_FILE);
        if file.is_file() {
            let text = std::fs::read_to_string(&file).map_err(|source| {
                ConfigError::FileReadError {
                    file: file.display().to_string(),
                    source,
                }
            })?;
            trace!(file = %file.display(), "Reading configuration file");
            config = config.merge_with(ConfigOverlay::from_toml_str(
                &text,
                &file.display().to_string(),
            )?);
        }

        // 3. .env below the real environment
        let mut merged: HashMap<String, String> = HashMap::new();
        let env_file = workdir.join(defaults::ENV_FILE);
        if env_file.is_file() {
            let entries = dotenvy::from_path_iter(&env_file).map_err(|source| {
                ConfigError::EnvFileError {
                    file: env_file.display().to_string(),
                    source,
                }
            })?;
            for entry in entries {
                let (name, value) = entry.map_err(|source| ConfigError::EnvFileError {
                    file: env_file.display().to_string(),
                    source,
                })?;
                merged.insert(name, value);
            }
        }

        // 4. Environment variables
        merged.extend(vars);
        let environment = EnvironmentConfig::from_vars(merged)?;
        config = config.merge_with(environment.into_overlay());

        config.validate()?;
        debug!(
            update = config.update,
            strict = config.lockfile_strict,
            policy = ?config.build_policy,
            "Configuration loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    include!("loader.test.rs");
}
