//! Host and build profiles
//!
//! A profile carries the settings and option values a context is evaluated
//! with, profile-level tool requirements, and forced-version overrides.

mod pattern;

pub use pattern::RefPattern;

use crate::primitives::{PackageReference, RefExpression, ReferenceError};
use crate::recipe::RequireEdge;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Profile loading and interpretation errors
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Failed to read profile: {path}: {source}")]
    FileReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse profile TOML: {source}")]
    TomlParseError {
        #[from]
        source: toml::de::Error,
    },

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Invalid option key '{key}', expected 'pattern:option'")]
    InvalidOptionKey { key: String },

    #[error("Invalid requirement in profile: {source}")]
    InvalidRequirement {
        #[from]
        source: ReferenceError,
    },
}

/// Tool requirements injected into every node selected by `pattern`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequirePattern {
    /// Reference glob selecting consumers; a leading `!` excludes them instead
    pub pattern: String,
    pub requires: Vec<String>,
}

/// Settings, options and directives for one context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Flat setting keys, sub-settings dotted (`compiler.version`)
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    /// `pattern:option` keys (`*:shared`, `zlib/*:fPIC`)
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub tool_requires: Vec<ToolRequirePattern>,
    /// Package name to forced version or full requirement
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

impl Profile {
    pub fn from_toml_str(text: &str) -> Result<Self, ProfileError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ProfileError::FileReadError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&content)
    }

    pub fn with_setting(mut self, key: &str, value: &str) -> Self {
        self.settings.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_tool_requires(mut self, pattern: &str, requires: &[&str]) -> Self {
        self.tool_requires.push(ToolRequirePattern {
            pattern: pattern.to_string(),
            requires: requires.iter().map(|r| r.to_string()).collect(),
        });
        self
    }

    pub fn with_override(mut self, name: &str, forced: &str) -> Self {
        self.overrides.insert(name.to_string(), forced.to_string());
        self
    }

    /// Settings restricted to the top-level names a recipe declares
    pub fn settings_for(&self, declared: &[String]) -> BTreeMap<String, String> {
        self.settings
            .iter()
            .filter(|(key, _)| {
                declared.iter().any(|d| {
                    key.as_str() == d
                        || key
                            .strip_prefix(d.as_str())
                            .is_some_and(|rest| rest.starts_with('.'))
                })
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Option values this profile assigns to `reference`.
    ///
    /// When several patterns set the same option, literal patterns win over
    /// globs and longer patterns win over shorter ones.
    pub fn option_values_for(
        &self,
        reference: &PackageReference,
    ) -> Result<BTreeMap<String, String>, ProfileError> {
        let mut chosen: BTreeMap<String, ((bool, usize), String)> = BTreeMap::new();
        for (key, value) in &self.options {
            let (pattern_text, option) =
                key.rsplit_once(':')
                    .ok_or_else(|| ProfileError::InvalidOptionKey { key: key.clone() })?;
            let pattern = parse_pattern(pattern_text)?;
            if !pattern.selects(Some(reference)) {
                continue;
            }
            let rank = pattern.specificity();
            match chosen.get(option) {
                Some((existing, _)) if *existing >= rank => {}
                _ => {
                    chosen.insert(option.to_string(), (rank, value.clone()));
                }
            }
        }
        Ok(chosen.into_iter().map(|(k, (_, v))| (k, v)).collect())
    }

    /// Tool requirements this profile injects into the node for `reference`
    pub fn tool_requires_for(
        &self,
        reference: Option<&PackageReference>,
    ) -> Result<Vec<RequireEdge>, ProfileError> {
        let mut edges = Vec::new();
        for entry in &self.tool_requires {
            let pattern = parse_pattern(&entry.pattern)?;
            if !pattern.selects(reference) {
                continue;
            }
            for text in &entry.requires {
                let edge = RequireEdge::tool_requires(text)?;
                if !edges.iter().any(|e: &RequireEdge| e.name() == edge.name()) {
                    edges.push(edge);
                }
            }
        }
        Ok(edges)
    }

    /// Forced requirement for `name`, if the profile overrides it
    pub fn override_for(&self, name: &str) -> Result<Option<RefExpression>, ProfileError> {
        let Some(forced) = self.overrides.get(name) else {
            return Ok(None);
        };
        let text = if forced.contains('/') {
            forced.clone()
        } else {
            format!("{}/{}", name, forced)
        };
        Ok(Some(RefExpression::parse(&text)?))
    }
}

fn parse_pattern(text: &str) -> Result<RefPattern, ProfileError> {
    RefPattern::parse(text).map_err(|source| ProfileError::InvalidPattern {
        pattern: text.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
