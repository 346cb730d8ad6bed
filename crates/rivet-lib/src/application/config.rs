//! Application configuration
//!
//! Resolution settings plus logging preferences, layered with the
//! precedence: defaults -> rivet.toml -> .env -> `RIVET_*` variables.

use crate::binary::{BuildPolicy, PolicyError};
use crate::graph::DependencyGraph;
use crate::lockfile::{LockedResolution, Lockfile};
use crate::orchestration::{BuildExecutor, OrchestrationError};
use crate::package_id::PackageIdentifier;
use crate::primitives::*;
use crate::recipe::PackageIdMode;
use serde::Deserialize;

/// Default configuration values
pub mod defaults {
    pub const CONFIG_FILE: &str = "rivet.toml";
    pub const ENV_FILE: &str = ".env";
    pub const ENV_PREFIX: &str = "RIVET_";
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RivetConfig {
    /// Re-check remotes even when the cache satisfies a requirement
    pub update: bool,
    /// Refuse references absent from the lockfile
    pub lockfile_strict: bool,
    /// Drop lockfile entries the new graph no longer resolves
    pub lockfile_clean: bool,
    /// Ordered build-policy directives (`never`, `missing`, `cascade`, patterns)
    pub build_policy: Vec<String>,
    pub default_package_id_mode: PackageIdMode,
    /// Worker-pool size; `None` uses the available parallelism
    pub jobs: Option<u32>,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
    pub log_output: LogOutput,
    pub color: bool,
}

impl Default for RivetConfig {
    fn default() -> Self {
        Self {
            update: false,
            lockfile_strict: false,
            lockfile_clean: false,
            build_policy: Vec::new(),
            default_package_id_mode: PackageIdMode::Semver,
            jobs: None,
            log_level: LogLevel::Warning,
            log_format: LogFormat::Text,
            log_output: LogOutput::Stderr,
            color: false,
        }
    }
}

/// One configuration source; unset fields leave lower layers untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigOverlay {
    pub update: Option<bool>,
    pub lockfile_strict: Option<bool>,
    pub lockfile_clean: Option<bool>,
    pub build_policy: Option<Vec<String>>,
    pub default_package_id_mode: Option<PackageIdMode>,
    pub jobs: Option<u32>,
    pub log_level: Option<LogLevel>,
    pub log_format: Option<LogFormat>,
    pub log_output: Option<LogOutput>,
    pub color: Option<bool>,
}

impl ConfigOverlay {
    /// Parse a `rivet.toml` document
    pub fn from_toml_str(text: &str, file: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::FileParseError {
            file: file.to_string(),
            source,
        })
    }
}

impl RivetConfig {
    /// Apply `overlay` on top of this configuration
    pub fn merge_with(mut self, overlay: ConfigOverlay) -> Self {
        if let Some(update) = overlay.update {
            self.update = update;
        }
        if let Some(strict) = overlay.lockfile_strict {
            self.lockfile_strict = strict;
        }
        if let Some(clean) = overlay.lockfile_clean {
            self.lockfile_clean = clean;
        }
        if let Some(policy) = overlay.build_policy {
            self.build_policy = policy;
        }
        if let Some(mode) = overlay.default_package_id_mode {
            self.default_package_id_mode = mode;
        }
        if overlay.jobs.is_some() {
            self.jobs = overlay.jobs;
        }
        if let Some(level) = overlay.log_level {
            self.log_level = level;
        }
        if let Some(format) = overlay.log_format {
            self.log_format = format;
        }
        if let Some(output) = overlay.log_output {
            self.log_output = output;
        }
        if let Some(color) = overlay.color {
            self.color = color;
        }
        self
    }

    /// Validate the final configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == Some(0) {
            return Err(ConfigError::ValidationFailed {
                reason: "jobs must be greater than 0".to_string(),
            });
        }
        self.build_policy()
            .map_err(|e| ConfigError::ValidationFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    pub fn to_logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            level: self.log_level,
            format: self.log_format,
            output: self.log_output,
            ansi: self.color,
        }
    }

    pub fn build_policy(&self) -> Result<BuildPolicy, PolicyError> {
        BuildPolicy::parse(&self.build_policy)
    }

    pub fn package_identifier(&self) -> PackageIdentifier {
        PackageIdentifier::new(self.default_package_id_mode)
    }

    /// View of `lockfile` honoring `lockfile_strict`
    pub fn locked_resolution<'a>(&self, lockfile: &'a Lockfile) -> LockedResolution<'a> {
        if self.lockfile_strict {
            LockedResolution::strict(lockfile)
        } else {
            LockedResolution::lenient(lockfile)
        }
    }

    /// Record `graph` in `lockfile`, dropping stale entries when
    /// `lockfile_clean` is set
    pub fn update_lockfile(&self, lockfile: &mut Lockfile, graph: &DependencyGraph) {
        lockfile.update(graph, self.lockfile_clean);
    }

    /// Worker pool sized by `jobs`, or by the available parallelism
    pub fn build_executor(&self) -> Result<BuildExecutor, OrchestrationError> {
        match self.jobs {
            Some(jobs) => BuildExecutor::new(jobs),
            None => BuildExecutor::with_default_jobs(),
        }
    }
}

#[cfg(test)]
mod tests {
    include!("config.test.rs");
}
