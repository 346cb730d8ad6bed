//! Cache and remote storage as seen by the resolution core
//!
//! The core never touches files or the network itself. It asks a
//! [`PackageSource`] which revisions exist and whether a binary is present,
//! checking the local cache before the configured remotes.

use crate::package_id::PackageId;
use crate::primitives::{PackageReference, RefExpression, VersionRange};
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a cache or remote
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Source '{origin}' is unavailable: {reason}")]
    Unavailable { origin: String, reason: String },

    #[error("Source '{origin}' returned an invalid answer: {reason}")]
    InvalidResponse { origin: String, reason: String },
}

/// A place packages can come from: the local cache or one remote
pub trait PackageSource: Send + Sync {
    /// Stable name used in logs and binary-origin bookkeeping
    fn name(&self) -> &str;

    /// All known revisions of `name`, optionally pre-filtered by version range
    fn list_revisions(
        &self,
        name: &str,
        range: Option<&VersionRange>,
    ) -> Result<Vec<PackageReference>, SourceError>;

    /// Whether a binary for `package_id` of `reference` is stored here
    fn has_binary(
        &self,
        reference: &PackageReference,
        package_id: &PackageId,
    ) -> Result<bool, SourceError>;

    /// Target of an alias requirement, if this source defines it
    fn alias_target(&self, _alias: &RefExpression) -> Result<Option<RefExpression>, SourceError> {
        Ok(None)
    }
}

/// The local cache followed by remotes in priority order
#[derive(Clone)]
pub struct SourceSet {
    cache: Arc<dyn PackageSource>,
    remotes: Vec<Arc<dyn PackageSource>>,
}

impl SourceSet {
    pub fn new(cache: Arc<dyn PackageSource>) -> Self {
        Self {
            cache,
            remotes: Vec::new(),
        }
    }

    /// Append a remote with lower priority than those already added
    pub fn with_remote(mut self, remote: Arc<dyn PackageSource>) -> Self {
        self.remotes.push(remote);
        self
    }

    pub fn cache(&self) -> &dyn PackageSource {
        self.cache.as_ref()
    }

    pub fn remotes(&self) -> impl Iterator<Item = &dyn PackageSource> {
        self.remotes.iter().map(|r| r.as_ref())
    }

    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }
}

impl std::fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSet")
            .field("cache", &self.cache.name())
            .field(
                "remotes",
                &self.remotes.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
