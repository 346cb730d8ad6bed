//! rivet primitives - core value types, errors, and logger configuration
//!
//! Central collection of shared types that every resolution stage speaks:
//! versions and references, the host/build context split, and the error
//! types for configuration and logging.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Shared macros and patterns
mod shared;
use shared::impl_fromstr_for_named_enum;

/// Versions and version ranges
pub mod version;
pub use version::{Version, VersionComponent, VersionRange};

/// Package references and requirement expressions
pub mod reference;
pub use reference::{PackageReference, RefExpression};

/// Which side of a cross-build a node is evaluated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    /// The platform the package is built for
    Host,
    /// The platform doing the building (tools)
    Build,
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Build => write!(f, "build"),
        }
    }
}

/// Errors raised while parsing references, versions and ranges
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("Invalid reference '{text}': {reason}")]
    InvalidReference { text: String, reason: String },

    #[error("Invalid version '{text}': {reason}")]
    InvalidVersion { text: String, reason: String },

    #[error("Invalid version range '{text}': {reason}")]
    InvalidRange { text: String, reason: String },
}

/// Available log output streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// STDERR
    Stderr,
    /// STDOUT
    Stdout,
}

/// Log levels for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// Output formats for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// TEXT
    /// alias: text, txt, plain
    Text,

    /// JSON
    /// alias: json
    Json,

    /// Multi-line human readable output
    /// alias: pretty, yaml, yml
    Pretty,
}

// ============================================================================
// LOGGER CONFIGURATION TYPES
// ============================================================================

/// Logger configuration derived from application config
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub ansi: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warning,
            format: LogFormat::Text,
            output: LogOutput::Stderr,
            ansi: false,
        }
    }
}

// ============================================================================
// STRUCTURED ERROR TYPES
// ============================================================================

/// Application configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load environment file '{file}': {source}")]
    EnvFileError {
        file: String,
        source: dotenvy::Error,
    },

    #[error("Failed to read configuration file '{file}': {source}")]
    FileReadError {
        file: String,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file '{file}': {source}")]
    FileParseError {
        file: String,
        source: toml::de::Error,
    },

    #[error("Failed to parse environment variables: {source}")]
    EnvironmentParsingFailed {
        #[from]
        source: envy::Error,
    },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Failed to parse configuration value '{value}': {reason}")]
    ParseError { value: String, reason: String },
}

/// Logger initialization and operation errors
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Failed to initialize tracing subscriber: {reason}")]
    InitializationFailed { reason: String },

    #[error("Logger already initialized")]
    AlreadyInitialized,
}

impl LogLevel {
    /// Convert a numeric verbosity to a LogLevel
    pub fn from_verbosity(verbosity: u8) -> Self {
        match verbosity {
            0 => LogLevel::Error,
            1 => LogLevel::Warning,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            4.. => LogLevel::Trace,
        }
    }

    /// Check if this log level should be displayed given current verbosity
    pub fn should_log(&self, current_level: LogLevel) -> bool {
        *self <= current_level
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, ConfigError> {
        value.parse()
    }
}

// Generate FromStr implementations for the logger enums
impl_fromstr_for_named_enum!(LogLevel, "invalid log level", {
    LogLevel::Error => ["error", "err", "fatal", "critical"],
    LogLevel::Warning => ["warn", "warning"],
    LogLevel::Info => ["info", "information"],
    LogLevel::Debug => ["debug", "debugging"],
    LogLevel::Trace => ["trace", "tracing", "verbose"],
});
impl_fromstr_for_named_enum!(LogFormat, "invalid log format", {
    LogFormat::Text => ["text", "txt", "plain"],
    LogFormat::Json => ["json"],
    LogFormat::Pretty => ["pretty", "yaml", "yml"],
});
impl_fromstr_for_named_enum!(LogOutput, "invalid log output stream", {
    LogOutput::Stderr => ["stderr"],
    LogOutput::Stdout => ["stdout"],
});
impl_fromstr_for_named_enum!(Context, "invalid context", {
    Context::Host => ["host"],
    Context::Build => ["build"],
});

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
