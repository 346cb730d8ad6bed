//! # rivet Library
//!
//! Dependency graph resolution and binary identity for compiled packages.
//!
//! ## Core Modules
//!
//! - [`primitives`] - Versions, references, contexts, and shared errors
//! - [`recipe`] - Recipe declarations and requirement traits
//! - [`storage`] - Cache and remote package sources
//! - [`profile`] - Host/build profiles, option patterns, and overrides
//! - [`resolver`] - Requirement to revisioned reference resolution
//! - [`package_id`] - Binary-compatibility package IDs
//! - [`graph`] - Dependency graph, build order, and graph expansion
//! - [`binary`] - Binary availability analysis and build policies
//! - [`lockfile`] - Reproducible resolutions
//! - [`observer`] - Structured resolution events
//! - [`orchestration`] - Bounded execution of build-order levels
//! - [`logger`] - Structured logging with progress tracking
//! - [`application`] - Configuration management
//!
//! ## Quick Start
//!
//! ```no_run
//! use rivet_lib::{
//!     BinaryAnalyzer, GraphBuilder, Profile, RecipeProvider, RootRequest, SourceSet,
//!     TracingObserver, RivetConfig,
//! };
//!
//! fn run(sources: &SourceSet, recipes: &dyn RecipeProvider) -> anyhow::Result<()> {
//!     let config = RivetConfig::load()?;
//!     let observer = TracingObserver;
//!     let mut graph = GraphBuilder::new(sources, recipes, &observer)
//!         .with_update(config.update)
//!         .with_identifier(config.package_identifier())
//!         .build(
//!             RootRequest::requires(&["zlib/[>=1.2 <2]"])?,
//!             &Profile::default(),
//!             &Profile::default(),
//!             None,
//!         )?;
//!     BinaryAnalyzer::new(sources, &observer).analyze(&mut graph, &config.build_policy()?);
//!     for level in graph.build_order_references()? {
//!         println!("{}", level.join(", "));
//!     }
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod binary;
pub mod graph;
pub mod lockfile;
pub mod logger;
pub mod observer;
pub mod orchestration;
pub mod package_id;
pub mod primitives;
pub mod profile;
pub mod recipe;
pub mod resolver;
pub mod storage;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use application::RivetConfig;
pub use binary::{BinaryAnalyzer, BinaryStatus, BuildPolicy, ensure_no_missing};
pub use graph::{
    CancelFlag, DependencyGraph, GraphBuilder, GraphError, GraphNode, NodeId, RootRequest,
};
pub use lockfile::{LockedEntry, LockedResolution, Lockfile};
pub use logger::Logger;
pub use observer::{EventRecorder, NullObserver, ResolutionEvent, ResolutionObserver, TracingObserver};
pub use orchestration::{BuildExecutor, BuildTask};
pub use package_id::{PackageId, PackageIdentifier};
pub use primitives::{
    ConfigError, Context, LogFormat, LogLevel, LogOutput, LoggerError, PackageReference,
    RefExpression, Version, VersionRange,
};
pub use profile::Profile;
pub use recipe::{PackageType, RecipeDeclaration, RecipeProvider, RequireEdge, RequireTraits};
pub use resolver::ReferenceResolver;
pub use storage::{PackageSource, SourceSet};
