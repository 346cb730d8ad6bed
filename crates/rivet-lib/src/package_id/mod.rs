//! Binary identity ("package ID") computation
//!
//! A package ID is the SHA-256 of a canonical text rendering of everything a
//! binary depends on: the settings and options the recipe declares and the
//! contributions of its dependencies, each reduced according to the
//! dependency's [`PackageIdMode`]. Every section is sorted before hashing,
//! so requirement declaration order never changes the result.

use crate::graph::{DependencyGraph, NodeId};
use crate::primitives::PackageReference;
use crate::profile::{Profile, ProfileError};
use crate::recipe::{PackageIdMode, RecipeDeclaration, RequireEdge};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::trace;

/// Package ID shared by every header-only or binary-less package:
/// the SHA-256 of empty input.
pub const CONFIGURATION_INDEPENDENT_ID: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Errors in the inputs to package ID computation
#[derive(Debug, Error)]
pub enum PackageIdentityError {
    #[error("Package ID of {dependency} is required by {node} but has not been computed")]
    MissingDependencyId { node: String, dependency: String },

    #[error("Option '{option}' of {node} has no value and no default")]
    MissingOptionValue { node: String, option: String },

    #[error("Option '{option}' of {node} set to '{value}', allowed values: {}", .allowed.join(", "))]
    InvalidOptionValue {
        node: String,
        option: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("Invalid profile options for {node}: {source}")]
    Profile { node: String, source: ProfileError },
}

/// Binary-compatibility hash of one configuration of a revisioned recipe
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn configuration_independent() -> Self {
        Self(CONFIGURATION_INDEPENDENT_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical inputs of a package ID
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    pub settings: BTreeMap<String, String>,
    pub options: BTreeMap<String, String>,
    /// `(dependency name, contribution)` pairs
    pub requires: Vec<(String, String)>,
    pub configuration_independent: bool,
}

impl PackageInfo {
    /// Text fed to the hash; stable across runs and platforms
    pub fn canonical_text(&self) -> String {
        if self.configuration_independent {
            return String::new();
        }

        let mut requires = self.requires.clone();
        requires.sort();
        requires.dedup();

        let mut text = String::new();
        text.push_str("[settings]\n");
        for (key, value) in &self.settings {
            text.push_str(&format!("{}={}\n", key, value));
        }
        text.push_str("[options]\n");
        for (key, value) in &self.options {
            text.push_str(&format!("{}={}\n", key, value));
        }
        text.push_str("[requires]\n");
        for (_, contribution) in &requires {
            text.push_str(contribution);
            text.push('\n');
        }
        text
    }

    pub fn package_id(&self) -> PackageId {
        if self.configuration_independent {
            return PackageId::configuration_independent();
        }
        let digest = Sha256::digest(self.canonical_text().as_bytes());
        PackageId(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }
}

/// What a dependency adds to its consumer's package ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contribution {
    Excluded,
    Text(String),
    /// `full` mode needs the dependency's package ID, which is not known yet
    MissingPackageId,
}

/// Contribution of `reference` under `mode`
pub fn contribution(
    reference: &PackageReference,
    package_id: Option<&PackageId>,
    mode: PackageIdMode,
) -> Contribution {
    let suffix = match (&reference.user, &reference.channel) {
        (Some(user), Some(channel)) => format!("@{}/{}", user, channel),
        (Some(user), None) => format!("@{}", user),
        _ => String::new(),
    };
    let version = &reference.version;
    let rendered = match mode {
        PackageIdMode::Unrelated => return Contribution::Excluded,
        PackageIdMode::Full => {
            return match package_id {
                Some(id) => Contribution::Text(format!("{}:{}", reference, id)),
                None => Contribution::MissingPackageId,
            };
        }
        PackageIdMode::Patch => version.masked(3, 3),
        PackageIdMode::Minor => version.masked(2, 3),
        PackageIdMode::Semver => match version.major() {
            Some(major) if major > 0 => version.masked(1, 3),
            _ => version.to_string(),
        },
    };
    Contribution::Text(format!("{}/{}{}", reference.name, rendered, suffix))
}

/// Option values of a node: recipe defaults overridden by profile patterns,
/// validated against the recipe's allowed values.
pub fn resolve_options(
    profile: &Profile,
    reference: &PackageReference,
    declaration: &RecipeDeclaration,
) -> Result<BTreeMap<String, String>, PackageIdentityError> {
    let node = reference.to_string();
    let assigned =
        profile
            .option_values_for(reference)
            .map_err(|source| PackageIdentityError::Profile {
                node: node.clone(),
                source,
            })?;

    let mut options = BTreeMap::new();
    for (option, schema) in &declaration.options {
        let value = assigned
            .get(option)
            .or(schema.default.as_ref())
            .ok_or_else(|| PackageIdentityError::MissingOptionValue {
                node: node.clone(),
                option: option.clone(),
            })?;
        if !schema.allows(value) {
            return Err(PackageIdentityError::InvalidOptionValue {
                node: node.clone(),
                option: option.clone(),
                value: value.clone(),
                allowed: schema.allowed.clone(),
            });
        }
        options.insert(option.clone(), value.clone());
    }
    Ok(options)
}

/// Computes package IDs for graph nodes
#[derive(Debug, Clone, Copy)]
pub struct PackageIdentifier {
    default_mode: PackageIdMode,
}

impl Default for PackageIdentifier {
    fn default() -> Self {
        Self::new(PackageIdMode::Semver)
    }
}

impl PackageIdentifier {
    pub fn new(default_mode: PackageIdMode) -> Self {
        Self { default_mode }
    }

    pub fn default_mode(&self) -> PackageIdMode {
        self.default_mode
    }

    /// Mode for one edge: recipe override, else unrelated for tool and test
    /// edges, else the configured default.
    pub fn mode_for(&self, modes: &BTreeMap<String, PackageIdMode>, edge: &RequireEdge) -> PackageIdMode {
        if let Some(mode) = modes.get(edge.name()) {
            return *mode;
        }
        if edge.traits.build || edge.traits.test {
            return PackageIdMode::Unrelated;
        }
        self.default_mode
    }

    /// Gather the canonical inputs for `node_id`. Dependencies needed in
    /// `full` mode must already carry their package ID.
    pub fn info(
        &self,
        graph: &DependencyGraph,
        node_id: NodeId,
    ) -> Result<PackageInfo, PackageIdentityError> {
        let node = &graph[node_id];
        if node.package_type.is_configuration_independent() {
            return Ok(PackageInfo {
                configuration_independent: true,
                ..PackageInfo::default()
            });
        }

        let mut requires = Vec::new();
        for dependency in &node.dependencies {
            let target = &graph[dependency.target];
            let Some(reference) = target.reference.as_ref() else {
                continue;
            };
            let mode = self.mode_for(&node.package_id_modes, &dependency.edge);
            match contribution(reference, target.package_id.as_ref(), mode) {
                Contribution::Excluded => {}
                Contribution::Text(text) => requires.push((reference.name.clone(), text)),
                Contribution::MissingPackageId => {
                    return Err(PackageIdentityError::MissingDependencyId {
                        node: node.display_name(),
                        dependency: reference.to_string(),
                    });
                }
            }
        }

        Ok(PackageInfo {
            settings: node.settings.clone(),
            options: node.options.clone(),
            requires,
            configuration_independent: false,
        })
    }

    pub fn compute(
        &self,
        graph: &DependencyGraph,
        node_id: NodeId,
    ) -> Result<PackageId, PackageIdentityError> {
        let info = self.info(graph, node_id)?;
        let id = info.package_id();
        trace!(node = %graph[node_id].display_name(), package_id = %id, "Computed package ID");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
