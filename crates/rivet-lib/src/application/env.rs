//! Environment variable handling for application configuration
//!
//! `RIVET_*` variables map onto [`ConfigOverlay`] fields (`RIVET_JOBS=4`,
//! `RIVET_BUILD_POLICY=missing,cascade`). `NO_COLOR` disables ANSI output
//! unless `RIVET_COLOR` says otherwise.

use super::config::{ConfigOverlay, defaults};
use crate::primitives::ConfigError;

/// Environment variables that affect configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub overlay: ConfigOverlay,
    /// NO_COLOR environment variable (any non-empty value disables color)
    pub no_color: bool,
}

impl EnvironmentConfig {
    /// Read from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Read from explicit `(name, value)` pairs
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        let no_color = vars
            .iter()
            .any(|(name, value)| name == "NO_COLOR" && !value.is_empty());
        let overlay = envy::prefixed(defaults::ENV_PREFIX).from_iter(vars)?;
        Ok(Self { overlay, no_color })
    }

    /// Overlay with `NO_COLOR` folded in
    pub fn into_overlay(self) -> ConfigOverlay {
        let mut overlay = self.overlay;
        if self.no_color && overlay.color.is_none() {
            overlay.color = Some(false);
        }
        overlay
    }
}

#[cfg(test)]
mod tests {
    include!("env.test.rs");
}
