//! Hermetic resolution environment
//!
//! Bundles an in-memory universe, host/build profiles, an event recorder and
//! a scratch directory so scenario tests read as a few calls.

use crate::fixtures::Universe;
use anyhow::Result;
use rivet_lib::binary::{BinaryAnalyzer, BuildPolicy};
use rivet_lib::graph::{DependencyGraph, GraphBuilder, GraphError, RootRequest};
use rivet_lib::lockfile::{LockedResolution, Lockfile};
use rivet_lib::observer::EventRecorder;
use rivet_lib::package_id::PackageIdentifier;
use rivet_lib::profile::Profile;
use rivet_lib::storage::SourceSet;
use rivet_lib::testing::{MemoryRecipes, MemorySource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestEnvironment {
    pub sources: SourceSet,
    pub cache: Arc<MemorySource>,
    pub remotes: Vec<Arc<MemorySource>>,
    pub recipes: MemoryRecipes,
    pub recorder: EventRecorder,
    pub host: Profile,
    pub build: Profile,
    pub identifier: PackageIdentifier,
    pub update: bool,
    dir: TempDir,
}

impl TestEnvironment {
    pub fn new(universe: &Universe) -> Result<Self> {
        let (sources, cache, remotes) = universe.sources()?;
        Ok(Self {
            sources,
            cache,
            remotes,
            recipes: universe.recipes()?,
            recorder: EventRecorder::new(),
            host: Profile::default(),
            build: Profile::default(),
            identifier: PackageIdentifier::default(),
            update: false,
            dir: TempDir::new()?,
        })
    }

    /// Environment for `fixtures/<name>.json`
    pub fn from_fixture(name: &str) -> Result<Self> {
        Self::new(&crate::fixtures::load_universe(name)?)
    }

    pub fn with_profiles(mut self, host: &str, build: &str) -> Result<Self> {
        self.host = Profile::from_toml_str(host)?;
        self.build = Profile::from_toml_str(build)?;
        Ok(self)
    }

    /// Scratch directory, also usable as a project working directory
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Scratch path inside the environment's temporary directory
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn builder(&self) -> GraphBuilder<'_> {
        GraphBuilder::new(&self.sources, &self.recipes, &self.recorder)
            .with_update(self.update)
            .with_identifier(self.identifier)
    }

    /// Resolve a virtual root requiring `requires`; panics on malformed
    /// requirement text
    pub fn resolve(&self, requires: &[&str]) -> Result<DependencyGraph, GraphError> {
        self.resolve_with(requires, None)
    }

    pub fn resolve_with(
        &self,
        requires: &[&str],
        locked: Option<LockedResolution<'_>>,
    ) -> Result<DependencyGraph, GraphError> {
        let root = RootRequest::requires(requires)
            .unwrap_or_else(|e| panic!("invalid requirement in scenario: {}", e));
        self.builder().build(root, &self.host, &self.build, locked)
    }

    /// Resolve against `lockfile` in strict mode
    pub fn resolve_strict(
        &self,
        requires: &[&str],
        lockfile: &Lockfile,
    ) -> Result<DependencyGraph, GraphError> {
        self.resolve_with(requires, Some(LockedResolution::strict(lockfile)))
    }

    /// Classify binaries of `graph` under `directives`
    pub fn analyze(&self, graph: &mut DependencyGraph, directives: &[&str]) -> Result<()> {
        let policy = BuildPolicy::parse(directives)?;
        BinaryAnalyzer::new(&self.sources, &self.recorder).analyze(graph, &policy);
        Ok(())
    }
}
