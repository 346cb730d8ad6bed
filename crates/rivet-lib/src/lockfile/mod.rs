//! Lockfiles: a frozen record of a prior resolution
//!
//! Entries are kept most-recent-first. The resolver walks them in that order
//! when several locked references satisfy the same requirement.

use crate::graph::DependencyGraph;
use crate::package_id::PackageId;
use crate::primitives::{Context, PackageReference, ReferenceError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Format version written to new lockfiles
pub const LOCKFILE_VERSION: &str = "0.1";

#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("Failed to access lockfile {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed lockfile: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Unsupported lockfile version '{version}', expected '{}'", LOCKFILE_VERSION)]
    UnsupportedVersion { version: String },

    #[error("Invalid locked reference '{text}': {source}")]
    InvalidReference {
        text: String,
        source: ReferenceError,
    },
}

/// One locked reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedEntry {
    /// Resolved reference, normally carrying a revision
    pub reference: PackageReference,
    pub package_id: Option<PackageId>,
    /// `None` locks the reference in both contexts
    pub context: Option<Context>,
}

impl LockedEntry {
    pub fn new(reference: PackageReference) -> Self {
        Self {
            reference,
            package_id: None,
            context: None,
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_package_id(mut self, package_id: PackageId) -> Self {
        self.package_id = Some(package_id);
        self
    }

    /// Whether the entry applies to requirements made in `context`
    pub fn applies_to(&self, context: Context) -> bool {
        self.context.is_none_or(|c| c == context)
    }

    fn key(&self) -> (String, Option<Context>, Option<PackageId>) {
        (
            self.reference.to_string(),
            self.context,
            self.package_id.clone(),
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockfileDocument {
    version: String,
    #[serde(default)]
    entries: Vec<EntryRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    package_id: Option<PackageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<Context>,
}

/// Per-resolution view of a lockfile
#[derive(Debug, Clone, Copy)]
pub struct LockedResolution<'a> {
    pub lockfile: &'a Lockfile,
    /// Forbid resolving anything the lockfile does not list
    pub strict: bool,
}

impl<'a> LockedResolution<'a> {
    pub fn strict(lockfile: &'a Lockfile) -> Self {
        Self {
            lockfile,
            strict: true,
        }
    }

    pub fn lenient(lockfile: &'a Lockfile) -> Self {
        Self {
            lockfile,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lockfile {
    entries: Vec<LockedEntry>,
}

impl Lockfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LockedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry unless an identical one is already locked
    pub fn add(&mut self, entry: LockedEntry) {
        if !self.entries.iter().any(|e| e.key() == entry.key()) {
            self.entries.push(entry);
        }
    }

    /// Entries locking `name` for requirements made in `context`, in lockfile order
    pub fn locked_for(&self, name: &str, context: Context) -> Vec<&LockedEntry> {
        self.entries
            .iter()
            .filter(|e| e.reference.name == name && e.applies_to(context))
            .collect()
    }

    /// Locked package ID of `reference` in `context`, if one was recorded
    pub fn package_id_for(
        &self,
        reference: &PackageReference,
        context: Context,
    ) -> Option<&PackageId> {
        self.entries
            .iter()
            .filter(|e| e.applies_to(context) && e.reference == *reference)
            .find_map(|e| e.package_id.as_ref())
    }

    pub fn parse(text: &str) -> Result<Self, LockfileError> {
        let document: LockfileDocument = serde_json::from_str(text)?;
        if document.version != LOCKFILE_VERSION {
            return Err(LockfileError::UnsupportedVersion {
                version: document.version,
            });
        }

        let mut lockfile = Self::new();
        for record in document.entries {
            let reference = PackageReference::parse(&record.reference).map_err(|source| {
                LockfileError::InvalidReference {
                    text: record.reference.clone(),
                    source,
                }
            })?;
            lockfile.add(LockedEntry {
                reference,
                package_id: record.package_id,
                context: record.context,
            });
        }
        Ok(lockfile)
    }

    /// Serialized document, pretty-printed with a trailing newline
    pub fn render(&self) -> Result<String, LockfileError> {
        let document = LockfileDocument {
            version: LOCKFILE_VERSION.to_string(),
            entries: self
                .entries
                .iter()
                .map(|e| EntryRecord {
                    reference: e.reference.full_repr(),
                    package_id: e.package_id.clone(),
                    context: e.context,
                })
                .collect(),
        };
        let mut text = serde_json::to_string_pretty(&document)?;
        text.push('\n');
        Ok(text)
    }

    pub fn load(path: &Path) -> Result<Self, LockfileError> {
        let text = std::fs::read_to_string(path).map_err(|source| LockfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let lockfile = Self::parse(&text)?;
        debug!(path = %path.display(), entries = lockfile.len(), "Loaded lockfile");
        Ok(lockfile)
    }

    pub fn save(&self, path: &Path) -> Result<(), LockfileError> {
        let text = self.render()?;
        std::fs::write(path, text).map_err(|source| LockfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), entries = self.len(), "Saved lockfile");
        Ok(())
    }

    /// Record every resolved node of `graph`.
    ///
    /// The graph's references go first. Older entries for a `(name, context)`
    /// the graph also resolved are replaced; older entries for anything else
    /// are kept unless `clean` is set.
    pub fn update(&mut self, graph: &DependencyGraph, clean: bool) {
        let mut fresh: Vec<LockedEntry> = graph
            .nodes()
            .filter(|node| !node.origin.is_root())
            .filter_map(|node| {
                let reference = node.reference.clone()?;
                Some(LockedEntry {
                    reference,
                    package_id: node.package_id.clone(),
                    context: Some(node.context),
                })
            })
            .collect();
        fresh.sort_by(|a, b| {
            (&a.reference.name, a.context, a.reference.full_repr())
                .cmp(&(&b.reference.name, b.context, b.reference.full_repr()))
        });

        let resolved: HashSet<(String, Option<Context>)> = fresh
            .iter()
            .map(|e| (e.reference.name.clone(), e.context))
            .collect();

        let previous = std::mem::take(&mut self.entries);
        for entry in fresh {
            self.add(entry);
        }
        if clean {
            return;
        }
        for entry in previous {
            let superseded = match entry.context {
                Some(context) => resolved.contains(&(entry.reference.name.clone(), Some(context))),
                None => {
                    resolved.contains(&(entry.reference.name.clone(), Some(Context::Host)))
                        || resolved.contains(&(entry.reference.name.clone(), Some(Context::Build)))
                }
            };
            if !superseded {
                self.add(entry);
            }
        }
    }

    /// Union with `other`; entries already present keep their position
    pub fn merge(&mut self, other: &Lockfile) {
        for entry in &other.entries {
            self.add(entry.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
