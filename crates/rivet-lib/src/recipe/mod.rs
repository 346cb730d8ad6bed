//! Recipe declarations as seen by the resolution core
//!
//! Recipe scripts are evaluated elsewhere. This module fixes the normalized
//! shape of their answer: the requirement edges, the settings and options
//! schema, and per-dependency package-id modes.

use crate::primitives::{PackageReference, RefExpression, ReferenceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors reported by a recipe provider
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Recipe not available for {reference}")]
    NotAvailable { reference: String },

    #[error("Invalid recipe for {reference}: {reason}")]
    Invalid { reference: String, reason: String },

    #[error("Invalid requirement in recipe: {source}")]
    InvalidRequirement {
        #[from]
        source: ReferenceError,
    },
}

/// Independent flags carried by a requirement edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequireTraits {
    /// Propagates transitively to consumers
    pub visible: bool,
    /// Belongs to the build (tool) context
    pub build: bool,
    /// Artifacts must be runnable
    pub run: bool,
    /// Only needed for the direct consumer's tests
    pub test: bool,
    /// Declared by the consumer itself rather than inherited
    pub direct: bool,
}

impl RequireTraits {
    /// Traits of a regular `requires` entry
    pub fn requires() -> Self {
        Self {
            visible: true,
            build: false,
            run: false,
            test: false,
            direct: true,
        }
    }

    /// Traits of a `tool_requires` entry
    pub fn tool_requires() -> Self {
        Self {
            visible: false,
            build: true,
            run: true,
            test: false,
            direct: true,
        }
    }

    /// Traits of a `test_requires` entry
    pub fn test_requires() -> Self {
        Self {
            visible: false,
            build: false,
            run: false,
            test: true,
            direct: true,
        }
    }

    /// Traits of an edge inherited through a visible dependency
    pub fn inherited(self) -> Self {
        Self {
            direct: false,
            ..self
        }
    }
}

/// One requirement edge: what is asked for and how it relates to the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireEdge {
    pub expression: RefExpression,
    pub traits: RequireTraits,
}

impl RequireEdge {
    pub fn new(expression: RefExpression, traits: RequireTraits) -> Self {
        Self { expression, traits }
    }

    pub fn requires(text: &str) -> Result<Self, ReferenceError> {
        Ok(Self::new(RefExpression::parse(text)?, RequireTraits::requires()))
    }

    pub fn tool_requires(text: &str) -> Result<Self, ReferenceError> {
        Ok(Self::new(
            RefExpression::parse(text)?,
            RequireTraits::tool_requires(),
        ))
    }

    pub fn test_requires(text: &str) -> Result<Self, ReferenceError> {
        Ok(Self::new(
            RefExpression::parse(text)?,
            RequireTraits::test_requires(),
        ))
    }

    pub fn name(&self) -> &str {
        self.expression.name()
    }
}

/// Declared kind of package; decides whether binaries depend on settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageType {
    #[default]
    Library,
    StaticLibrary,
    SharedLibrary,
    HeaderLibrary,
    Application,
    /// Scripts or data with no compiled binary
    BuildScripts,
}

impl PackageType {
    /// Packages whose single binary is usable under any configuration
    pub fn is_configuration_independent(&self) -> bool {
        matches!(self, Self::HeaderLibrary | Self::BuildScripts)
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Library => "library",
            Self::StaticLibrary => "static-library",
            Self::SharedLibrary => "shared-library",
            Self::HeaderLibrary => "header-library",
            Self::Application => "application",
            Self::BuildScripts => "build-scripts",
        };
        f.write_str(name)
    }
}

/// Schema for one recipe option
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OptionDeclaration {
    /// Allowed values; empty means any value
    #[serde(default)]
    pub allowed: Vec<String>,
    /// Value used when no profile sets one
    #[serde(default)]
    pub default: Option<String>,
}

impl OptionDeclaration {
    pub fn new(allowed: &[&str], default: Option<&str>) -> Self {
        Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            default: default.map(str::to_string),
        }
    }

    pub fn allows(&self, value: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|a| a == value)
    }
}

/// How much of a dependency's identity flows into a consumer's package ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageIdMode {
    /// Full reference, revision and package ID
    Full,
    /// Version up to the minor component
    Minor,
    /// Version up to the patch component
    Patch,
    /// Major version only (full version while major is 0)
    Semver,
    /// Dependency excluded from the consumer's package ID
    Unrelated,
}

impl fmt::Display for PackageIdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Full => "full",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::Semver => "semver",
            Self::Unrelated => "unrelated",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for PackageIdMode {
    type Err = crate::primitives::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "full_mode" => Ok(Self::Full),
            "minor" | "minor_mode" => Ok(Self::Minor),
            "patch" | "patch_mode" => Ok(Self::Patch),
            "semver" | "semver_mode" => Ok(Self::Semver),
            "unrelated" | "unrelated_mode" => Ok(Self::Unrelated),
            _ => Err(crate::primitives::ConfigError::ParseError {
                value: s.to_string(),
                reason: "invalid package id mode".to_string(),
            }),
        }
    }
}

/// Normalized answer of recipe evaluation for one reference
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeDeclaration {
    pub package_type: PackageType,
    pub requires: Vec<RequireEdge>,
    pub tool_requires: Vec<RequireEdge>,
    pub test_requires: Vec<RequireEdge>,
    /// Top-level setting names the binary depends on (`os`, `compiler`, ...)
    pub settings: Vec<String>,
    pub options: BTreeMap<String, OptionDeclaration>,
    /// Per-dependency overrides of the default package-id mode
    pub package_id_modes: BTreeMap<String, PackageIdMode>,
}

impl RecipeDeclaration {
    pub fn new(package_type: PackageType) -> Self {
        Self {
            package_type,
            ..Self::default()
        }
    }

    pub fn with_requires(mut self, texts: &[&str]) -> Result<Self, ReferenceError> {
        for text in texts {
            self.requires.push(RequireEdge::requires(text)?);
        }
        Ok(self)
    }

    pub fn with_tool_requires(mut self, texts: &[&str]) -> Result<Self, ReferenceError> {
        for text in texts {
            self.tool_requires.push(RequireEdge::tool_requires(text)?);
        }
        Ok(self)
    }

    pub fn with_test_requires(mut self, texts: &[&str]) -> Result<Self, ReferenceError> {
        for text in texts {
            self.test_requires.push(RequireEdge::test_requires(text)?);
        }
        Ok(self)
    }

    pub fn with_settings(mut self, settings: &[&str]) -> Self {
        self.settings = settings.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_option(mut self, name: &str, declaration: OptionDeclaration) -> Self {
        self.options.insert(name.to_string(), declaration);
        self
    }

    pub fn with_package_id_mode(mut self, dependency: &str, mode: PackageIdMode) -> Self {
        self.package_id_modes.insert(dependency.to_string(), mode);
        self
    }
}

/// Recipe evaluation collaborator
///
/// Called once per graph node to discover its edges and schema.
pub trait RecipeProvider {
    fn declaration(&self, reference: &PackageReference) -> Result<RecipeDeclaration, RecipeError>;
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
