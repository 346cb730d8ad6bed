//! Reference resolution
//!
//! Turns a requirement expression into one concrete, revisioned reference by
//! consulting the local cache and then each remote in priority order.
//! Remotes that fail once are skipped for the rest of the resolution, and
//! each expression resolves to the same answer every time it is asked.

use crate::graph::NodeOrigin;
use crate::lockfile::{LockedEntry, LockedResolution};
use crate::observer::{ResolutionEvent, ResolutionObserver};
use crate::primitives::{Context, PackageReference, RefExpression, VersionRange};
use crate::storage::{PackageSource, SourceError, SourceSet};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Package '{requirement}' not found in the cache or any remote")]
    NotFound { requirement: String },

    #[error(
        "Version range '{requirement}' matches none of the available versions: {}",
        .available.join(", ")
    )]
    RangeUnsatisfiable {
        requirement: String,
        available: Vec<String>,
    },

    #[error(
        "Requirement '{requirement}' conflicts with the lockfile (locked: {})",
        .locked.join(", ")
    )]
    LockfileConflict {
        requirement: String,
        locked: Vec<String>,
    },

    #[error("Alias loop detected: {}", .chain.join(" -> "))]
    AliasCycle { chain: Vec<String> },

    #[error("Local cache failed: {source}")]
    Cache {
        #[from]
        source: SourceError,
    },
}

/// A resolved reference and where it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub reference: PackageReference,
    pub origin: NodeOrigin,
}

/// Resolver over one [`SourceSet`], valid for a single graph resolution
pub struct ReferenceResolver<'a> {
    sources: &'a SourceSet,
    observer: &'a dyn ResolutionObserver,
    update: bool,
    unavailable: HashSet<String>,
    memo: HashMap<(String, Context), Located>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(sources: &'a SourceSet, observer: &'a dyn ResolutionObserver) -> Self {
        Self {
            sources,
            observer,
            update: false,
            unavailable: HashSet::new(),
            memo: HashMap::new(),
        }
    }

    /// Check every remote even when the cache already satisfies a requirement
    pub fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    pub fn resolve(
        &mut self,
        requirement: &RefExpression,
        context: Context,
        locked: Option<&LockedResolution<'_>>,
    ) -> Result<PackageReference, ResolveError> {
        Ok(self.resolve_located(requirement, context, locked)?.reference)
    }

    pub fn resolve_located(
        &mut self,
        requirement: &RefExpression,
        context: Context,
        locked: Option<&LockedResolution<'_>>,
    ) -> Result<Located, ResolveError> {
        let key = (requirement.to_string(), context);
        if let Some(found) = self.memo.get(&key) {
            trace!(requirement = %key.0, reference = %found.reference, "Memoised resolution");
            return Ok(found.clone());
        }

        let target = self.collapse_alias(requirement)?;
        let found = self.resolve_concrete(&target, context, locked)?;
        debug!(
            requirement = %requirement,
            reference = %found.reference,
            %context,
            "Resolved requirement"
        );
        self.memo.insert(key, found.clone());
        Ok(found)
    }

    /// Follow alias indirections until a non-alias requirement remains
    fn collapse_alias(&mut self, requirement: &RefExpression) -> Result<RefExpression, ResolveError> {
        let mut current = requirement.clone();
        let mut chain = Vec::new();
        let mut seen = HashSet::new();

        while let RefExpression::Alias {
            name,
            alias,
            user,
            channel,
        } = &current
        {
            let text = current.to_string();
            chain.push(text.clone());
            if !seen.insert(text) {
                return Err(ResolveError::AliasCycle { chain });
            }

            current = match self.alias_target(&current)? {
                Some(target) => target,
                None if alias == "latest" => RefExpression::Range {
                    name: name.clone(),
                    range: VersionRange::any(),
                    user: user.clone(),
                    channel: channel.clone(),
                },
                None => {
                    return Err(ResolveError::NotFound {
                        requirement: current.to_string(),
                    });
                }
            };
        }
        Ok(current)
    }

    fn alias_target(&mut self, alias: &RefExpression) -> Result<Option<RefExpression>, ResolveError> {
        if let Some(target) = self.sources.cache().alias_target(alias)? {
            return Ok(Some(target));
        }
        let sources = self.sources;
        for remote in sources.remotes() {
            if self.unavailable.contains(remote.name()) {
                continue;
            }
            match remote.alias_target(alias) {
                Ok(Some(target)) => return Ok(Some(target)),
                Ok(None) => {}
                Err(error) => self.mark_unavailable(remote, &error),
            }
        }
        Ok(None)
    }

    fn resolve_concrete(
        &mut self,
        requirement: &RefExpression,
        context: Context,
        locked: Option<&LockedResolution<'_>>,
    ) -> Result<Located, ResolveError> {
        let name = requirement.name();
        let locked_entries: Vec<&LockedEntry> = locked
            .map(|l| l.lockfile.locked_for(name, context))
            .unwrap_or_default();

        let accepted = self.candidates(requirement, &locked_entries)?;

        if let Some(locked) = locked {
            if let Some(found) = pick_locked(&locked_entries, &accepted) {
                return Ok(found);
            }
            if locked.strict {
                return Err(ResolveError::LockfileConflict {
                    requirement: requirement.to_string(),
                    locked: locked_entries
                        .iter()
                        .map(|e| e.reference.to_string())
                        .collect(),
                });
            }
            if !locked_entries.is_empty() {
                self.observer.on_event(&ResolutionEvent::LockfileFallback {
                    requirement: requirement.to_string(),
                    context,
                });
            }
        }

        if let Some(best) = select_newest(accepted) {
            return Ok(best);
        }

        match requirement {
            RefExpression::Range { .. } => {
                let available = self.available_versions(name)?;
                if available.is_empty() {
                    Err(ResolveError::NotFound {
                        requirement: requirement.to_string(),
                    })
                } else {
                    Err(ResolveError::RangeUnsatisfiable {
                        requirement: requirement.to_string(),
                        available,
                    })
                }
            }
            _ => Err(ResolveError::NotFound {
                requirement: requirement.to_string(),
            }),
        }
    }

    /// Candidates accepted by `requirement`, cache first then remotes.
    ///
    /// Without `update`, the search stops at the first source that has an
    /// acceptable candidate (and a locked one, when entries are locked).
    fn candidates(
        &mut self,
        requirement: &RefExpression,
        locked_entries: &[&LockedEntry],
    ) -> Result<Vec<Located>, ResolveError> {
        let name = requirement.name();
        let hint = match requirement {
            RefExpression::Range { range, .. } => Some(range),
            _ => None,
        };
        let satisfied = |found: &[Located]| {
            !found.is_empty()
                && (locked_entries.is_empty()
                    || found
                        .iter()
                        .any(|c| locked_entries.iter().any(|e| e.reference == c.reference)))
        };

        let mut accepted: Vec<Located> = Vec::new();
        let from_cache: Vec<Located> = self
            .sources
            .cache()
            .list_revisions(name, hint)?
            .into_iter()
            .filter(|r| requirement.accepts(r))
            .map(|reference| Located {
                reference,
                origin: NodeOrigin::Cache,
            })
            .collect();
        let done = !self.update && satisfied(&from_cache);
        merge_candidates(&mut accepted, from_cache);
        if done {
            return Ok(accepted);
        }

        let sources = self.sources;
        for remote in sources.remotes() {
            if self.unavailable.contains(remote.name()) {
                continue;
            }
            let listed = match remote.list_revisions(name, hint) {
                Ok(listed) => listed,
                Err(error) => {
                    self.mark_unavailable(remote, &error);
                    continue;
                }
            };
            let from_remote: Vec<Located> = listed
                .into_iter()
                .filter(|r| requirement.accepts(r))
                .map(|reference| Located {
                    reference,
                    origin: NodeOrigin::Remote(remote.name().to_string()),
                })
                .collect();
            let done = !self.update && satisfied(&from_remote);
            merge_candidates(&mut accepted, from_remote);
            if done {
                break;
            }
        }
        Ok(accepted)
    }

    /// Every version of `name` any reachable source knows, for error reports
    fn available_versions(&mut self, name: &str) -> Result<Vec<String>, ResolveError> {
        let mut versions: Vec<PackageReference> = self.sources.cache().list_revisions(name, None)?;
        let sources = self.sources;
        for remote in sources.remotes() {
            if self.unavailable.contains(remote.name()) {
                continue;
            }
            match remote.list_revisions(name, None) {
                Ok(listed) => versions.extend(listed),
                Err(error) => self.mark_unavailable(remote, &error),
            }
        }
        versions.sort_by(|a, b| a.version.cmp(&b.version));
        let mut rendered: Vec<String> = versions.iter().map(|r| r.recipe_repr()).collect();
        rendered.dedup();
        Ok(rendered)
    }

    fn mark_unavailable(&mut self, remote: &dyn PackageSource, error: &SourceError) {
        if self.unavailable.insert(remote.name().to_string()) {
            self.observer.on_event(&ResolutionEvent::RemoteUnavailable {
                remote: remote.name().to_string(),
                reason: error.to_string(),
            });
        }
    }
}

/// Append candidates not already known from a higher-priority source
fn merge_candidates(into: &mut Vec<Located>, found: Vec<Located>) {
    for candidate in found {
        let known = into.iter().any(|c| {
            c.reference == candidate.reference && c.reference.revision == candidate.reference.revision
        });
        if !known {
            into.push(candidate);
        }
    }
}

/// Highest version, newest revision on ties; a full tie keeps the
/// candidate from the higher-priority source
fn select_newest(candidates: Vec<Located>) -> Option<Located> {
    // max_by keeps the last maximum, so walk lowest priority first
    candidates.into_iter().rev().max_by(|a, b| {
        a.reference
            .version
            .cmp(&b.reference.version)
            .then(a.reference.timestamp.cmp(&b.reference.timestamp))
    })
}

/// First lockfile entry with an acceptable candidate wins
fn pick_locked(entries: &[&LockedEntry], accepted: &[Located]) -> Option<Located> {
    entries.iter().find_map(|entry| {
        select_newest(
            accepted
                .iter()
                .filter(|c| c.reference == entry.reference)
                .cloned()
                .collect(),
        )
    })
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
