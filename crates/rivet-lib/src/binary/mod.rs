//! Binary availability analysis
//!
//! Classifies every resolved node as reusable from the cache, downloadable
//! from a remote, to be built from source, or missing. Classification never
//! fails; turning `Missing` nodes into an error is left to the caller
//! ([`ensure_no_missing`]).

use crate::graph::{DependencyGraph, NodeId};
use crate::observer::{ResolutionEvent, ResolutionObserver};
use crate::package_id::PackageId;
use crate::primitives::PackageReference;
use crate::profile::RefPattern;
use crate::storage::SourceSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// What has to happen to obtain a node's binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryStatus {
    /// Present in the local cache
    Cache,
    /// Present on a remote
    Download,
    /// Must be built from source
    Build,
    /// Absent and not allowed to be built
    Missing,
}

impl fmt::Display for BinaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cache => "cache",
            Self::Download => "download",
            Self::Build => "build",
            Self::Missing => "missing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid build policy directive '{directive}': {source}")]
    InvalidPattern {
        directive: String,
        source: glob::PatternError,
    },

    #[error("Empty build policy directive")]
    EmptyDirective,
}

/// Raised by [`ensure_no_missing`]
#[derive(Debug, Error)]
#[error("Missing prebuilt binaries for: {}", .missing.join(", "))]
pub struct MissingBinariesError {
    pub missing: Vec<String>,
}

/// One entry of a build policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDirective {
    /// Reuse existing binaries only
    Never,
    /// Build whatever has no binary; `missing:pattern` limits it to matches
    Missing(Option<RefPattern>),
    /// Rebuild consumers of anything being built
    Cascade,
    /// Build matching nodes from source; a negated pattern protects
    /// matching nodes from building instead
    Pattern(RefPattern),
}

impl PolicyDirective {
    pub fn parse(text: &str) -> Result<Self, PolicyError> {
        let text = text.trim();
        let pattern = |body: &str| {
            RefPattern::parse(body).map_err(|source| PolicyError::InvalidPattern {
                directive: text.to_string(),
                source,
            })
        };
        match text {
            "" => Err(PolicyError::EmptyDirective),
            "never" => Ok(Self::Never),
            "missing" => Ok(Self::Missing(None)),
            "cascade" => Ok(Self::Cascade),
            _ => match text.strip_prefix("missing:") {
                Some(body) => Ok(Self::Missing(Some(pattern(body)?))),
                None => Ok(Self::Pattern(pattern(text)?)),
            },
        }
    }
}

impl fmt::Display for PolicyDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("never"),
            Self::Missing(None) => f.write_str("missing"),
            Self::Missing(Some(pattern)) => write!(f, "missing:{}", pattern),
            Self::Cascade => f.write_str("cascade"),
            Self::Pattern(pattern) => write!(f, "{}", pattern),
        }
    }
}

/// How the policy treats one node before cascading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    ReuseOnly,
    BuildIfMissing,
    ForceBuild,
    /// Reuse only, and exempt from cascade
    Protected,
}

/// Ordered build-policy directives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPolicy {
    directives: Vec<PolicyDirective>,
}

impl BuildPolicy {
    pub fn parse<S: AsRef<str>>(directives: &[S]) -> Result<Self, PolicyError> {
        Ok(Self {
            directives: directives
                .iter()
                .map(|d| PolicyDirective::parse(d.as_ref()))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn directives(&self) -> &[PolicyDirective] {
        &self.directives
    }

    pub fn cascades(&self) -> bool {
        self.directives.contains(&PolicyDirective::Cascade)
    }

    /// First directive matching `reference` decides; none means reuse only
    fn decide(&self, reference: &PackageReference) -> Decision {
        for directive in &self.directives {
            match directive {
                PolicyDirective::Never => return Decision::ReuseOnly,
                PolicyDirective::Missing(None) => return Decision::BuildIfMissing,
                PolicyDirective::Missing(Some(pattern)) => {
                    if pattern.selects(Some(reference)) {
                        return Decision::BuildIfMissing;
                    }
                }
                PolicyDirective::Cascade => {}
                PolicyDirective::Pattern(pattern) => {
                    if pattern.is_negated() {
                        if pattern.matches(reference) {
                            return Decision::Protected;
                        }
                    } else if pattern.matches(reference) {
                        return Decision::ForceBuild;
                    }
                }
            }
        }
        Decision::ReuseOnly
    }
}

/// Classifies graph nodes against the cache and remotes
pub struct BinaryAnalyzer<'a> {
    sources: &'a SourceSet,
    observer: &'a dyn ResolutionObserver,
}

impl<'a> BinaryAnalyzer<'a> {
    pub fn new(sources: &'a SourceSet, observer: &'a dyn ResolutionObserver) -> Self {
        Self { sources, observer }
    }

    /// Attach a binary status to every non-root node of `graph`
    pub fn analyze(&self, graph: &mut DependencyGraph, policy: &BuildPolicy) {
        let order: Vec<NodeId> = graph
            .dependency_first_order()
            .into_iter()
            .filter(|id| !graph[*id].origin.is_root())
            .collect();

        let mut protected = HashSet::new();
        for &id in &order {
            let Some(reference) = graph[id].reference.clone() else {
                continue;
            };
            let package_id = graph[id].package_id.clone();
            let decision = policy.decide(&reference);
            if decision == Decision::Protected {
                protected.insert(id);
            }

            let (status, remote) = match decision {
                Decision::ForceBuild => (BinaryStatus::Build, None),
                _ => match self.locate(&reference, package_id.as_ref()) {
                    Some(found) => found,
                    None if decision == Decision::BuildIfMissing => (BinaryStatus::Build, None),
                    None => (BinaryStatus::Missing, None),
                },
            };
            let node = graph.node_mut(id);
            node.binary_status = Some(status);
            node.binary_remote = remote;
        }

        if policy.cascades() {
            for &id in &order {
                if protected.contains(&id) || graph[id].binary_status == Some(BinaryStatus::Build) {
                    continue;
                }
                let upstream_build = graph[id]
                    .dependencies
                    .iter()
                    .any(|d| graph[d.target].binary_status == Some(BinaryStatus::Build));
                if upstream_build {
                    debug!(node = %graph[id].display_name(), "Cascading rebuild");
                    let node = graph.node_mut(id);
                    node.binary_status = Some(BinaryStatus::Build);
                    node.binary_remote = None;
                }
            }
        }

        for &id in &order {
            let node = &graph[id];
            if let Some(status) = node.binary_status {
                self.observer.on_event(&ResolutionEvent::BinaryClassified {
                    reference: node.display_name(),
                    context: node.context,
                    status,
                    remote: node.binary_remote.clone(),
                });
            }
        }
    }

    /// Cache first, then remotes in priority order. Lookup failures count
    /// as absence.
    fn locate(
        &self,
        reference: &PackageReference,
        package_id: Option<&PackageId>,
    ) -> Option<(BinaryStatus, Option<String>)> {
        let package_id = package_id?;
        let cache = self.sources.cache();
        match cache.has_binary(reference, package_id) {
            Ok(true) => return Some((BinaryStatus::Cache, None)),
            Ok(false) => {}
            Err(error) => self.lookup_failed(reference, cache.name(), &error.to_string()),
        }
        for remote in self.sources.remotes() {
            match remote.has_binary(reference, package_id) {
                Ok(true) => return Some((BinaryStatus::Download, Some(remote.name().to_string()))),
                Ok(false) => {}
                Err(error) => self.lookup_failed(reference, remote.name(), &error.to_string()),
            }
        }
        None
    }

    fn lookup_failed(&self, reference: &PackageReference, source: &str, reason: &str) {
        self.observer.on_event(&ResolutionEvent::BinaryLookupFailed {
            reference: reference.to_string(),
            source: source.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Fail when any node ended up `Missing`
pub fn ensure_no_missing(graph: &DependencyGraph) -> Result<(), MissingBinariesError> {
    let mut missing: Vec<String> = graph
        .nodes()
        .filter(|n| n.binary_status == Some(BinaryStatus::Missing))
        .map(|n| match &n.package_id {
            Some(id) => format!("{}:{}", n.display_name(), id),
            None => n.display_name(),
        })
        .collect();
    missing.sort();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingBinariesError { missing })
    }
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
