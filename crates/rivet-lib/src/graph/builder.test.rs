// Tests for graph expansion: collapse, conflicts, cycles and contexts

use super::*;
use crate::lockfile::{LockedEntry, Lockfile};
use crate::observer::{EventRecorder, NullObserver};
use crate::package_id::{CONFIGURATION_INDEPENDENT_ID, PackageId};
use crate::recipe::PackageType;
use crate::testing::{MemoryRecipes, MemorySource};

// ============================================================================
// Test Utilities
// ============================================================================

struct World {
    sources: SourceSet,
    recipes: MemoryRecipes,
}

impl World {
    fn new(revisions: &[&str]) -> Self {
        let cache = Arc::new(MemorySource::new("cache"));
        cache.add_revisions(revisions).unwrap();
        Self {
            sources: SourceSet::new(cache),
            recipes: MemoryRecipes::new(),
        }
    }

    fn recipe(&mut self, reference: &str, requires: &[&str]) -> &mut Self {
        let declaration = RecipeDeclaration::new(PackageType::Library)
            .with_requires(requires)
            .unwrap();
        self.declare(reference, declaration)
    }

    fn declare(&mut self, reference: &str, declaration: RecipeDeclaration) -> &mut Self {
        self.recipes.add(reference, declaration).unwrap();
        self
    }

    fn build(&self, root: RootRequest) -> Result<DependencyGraph, GraphError> {
        self.build_with(root, &Profile::default(), &Profile::default(), None, &NullObserver)
    }

    fn build_with(
        &self,
        root: RootRequest,
        host: &Profile,
        build: &Profile,
        locked: Option<LockedResolution<'_>>,
        observer: &dyn ResolutionObserver,
    ) -> Result<DependencyGraph, GraphError> {
        GraphBuilder::new(&self.sources, &self.recipes, observer).build(root, host, build, locked)
    }
}

fn only(graph: &DependencyGraph, name: &str, context: Context) -> NodeId {
    let found = graph.find(name, context);
    assert_eq!(found.len(), 1, "expected one {} node in {} context", name, context);
    found[0]
}

fn dependency_names(graph: &DependencyGraph, id: NodeId) -> Vec<String> {
    graph[id]
        .dependencies
        .iter()
        .map(|d| graph[d.target].name().unwrap_or_default().to_string())
        .collect()
}

// ============================================================================
// Expansion and diamond collapse
// ============================================================================

#[test]
fn test_diamond_collapses_to_one_node() {
    let mut world = World::new(&["app/1.0#ra", "liba/1.0#r1", "libb/1.0#r2", "zlib/1.3#rz"]);
    world
        .recipe("app/1.0", &["liba/1.0", "libb/1.0"])
        .recipe("liba/1.0", &["zlib/[>=1.2 <2]"])
        .recipe("libb/1.0", &["zlib/1.3"])
        .recipe("zlib/1.3", &[]);
    let recorder = EventRecorder::new();

    let graph = world
        .build_with(
            RootRequest::requires(&["app/1.0"]).unwrap(),
            &Profile::default(),
            &Profile::default(),
            None,
            &recorder,
        )
        .unwrap();

    let zlib = only(&graph, "zlib", Context::Host);
    let liba = only(&graph, "liba", Context::Host);
    let libb = only(&graph, "libb", Context::Host);
    assert_eq!(graph[liba].dependencies[0].target, zlib);
    assert_eq!(graph[libb].dependencies[0].target, zlib);
    assert_eq!(graph.node_count(), 5);
    assert!(recorder
        .events()
        .iter()
        .any(|e| matches!(e, ResolutionEvent::DiamondCollapsed { reference, .. } if reference == "zlib/1.3#rz")));
}

#[test]
fn test_recipes_evaluated_once_per_node() {
    let mut world = World::new(&["liba/1.0#r1", "libb/1.0#r2", "zlib/1.3#rz"]);
    world
        .recipe("liba/1.0", &["zlib/1.3"])
        .recipe("libb/1.0", &["zlib/1.3"])
        .recipe("zlib/1.3", &[]);

    world
        .build(RootRequest::requires(&["liba/1.0", "libb/1.0"]).unwrap())
        .unwrap();
    assert_eq!(world.recipes.calls(), 3);
}

#[test]
fn test_dependencies_keep_declaration_order() {
    let mut world = World::new(&["app/1.0#ra", "zlib/1.3#rz", "bzip2/1.0#rb", "fmt/10.1#rf"]);
    world
        .recipe("app/1.0", &["zlib/1.3", "bzip2/1.0", "fmt/10.1"])
        .recipe("zlib/1.3", &[])
        .recipe("bzip2/1.0", &[])
        .recipe("fmt/10.1", &[]);

    let graph = world.build(RootRequest::requires(&["app/1.0"]).unwrap()).unwrap();
    let app = only(&graph, "app", Context::Host);
    assert_eq!(dependency_names(&graph, app), vec!["zlib", "bzip2", "fmt"]);
}

#[test]
fn test_missing_recipe_is_reported() {
    let world = World::new(&["liba/1.0#r1"]);
    let result = world.build(RootRequest::requires(&["liba/1.0"]).unwrap());
    assert!(matches!(result, Err(GraphError::Recipe { .. })));
}

#[test]
fn test_unresolvable_requirement_aborts() {
    let world = World::new(&[]);
    let result = world.build(RootRequest::requires(&["ghost/1.0"]).unwrap());
    assert!(matches!(result, Err(GraphError::Resolve(_))));
}

// ============================================================================
// Conflicts and overrides
// ============================================================================

#[test]
fn test_exact_pin_conflicts_with_first_seen_range() {
    let mut world = World::new(&["liba/1.2#r12", "liba/1.5#r15", "libb/1.0#rb"]);
    world
        .recipe("liba/1.2", &[])
        .recipe("liba/1.5", &[])
        .recipe("libb/1.0", &["liba/1.2"]);
    let recorder = EventRecorder::new();

    let result = world.build_with(
        RootRequest::requires(&["liba/[>=1.0 <2.0]", "libb/1.0"]).unwrap(),
        &Profile::default(),
        &Profile::default(),
        None,
        &recorder,
    );

    match result {
        Err(GraphError::VersionConflict {
            name,
            fixed,
            fixed_by,
            requested,
            requested_by,
            ..
        }) => {
            assert_eq!(name, "liba");
            assert_eq!(fixed, "liba/1.5#r15");
            assert_eq!(fixed_by, "<virtual root>");
            assert_eq!(requested, "liba/1.2");
            assert_eq!(requested_by, "libb/1.0#rb");
        }
        other => panic!("expected version conflict, got {:?}", other),
    }
    assert!(recorder
        .events()
        .iter()
        .any(|e| matches!(e, ResolutionEvent::ConflictDetected { .. })));
}

#[test]
fn test_stricter_later_range_fails_fast() {
    let mut world = World::new(&["liba/1.2#r12", "liba/1.5#r15", "libb/1.0#rb"]);
    world
        .recipe("liba/1.2", &[])
        .recipe("liba/1.5", &[])
        .recipe("libb/1.0", &["liba/[<1.3]"]);

    match world.build(RootRequest::requires(&["liba/[>=1.0 <2.0]", "libb/1.0"]).unwrap()) {
        Err(GraphError::VersionConflict {
            name,
            context,
            fixed,
            fixed_by,
            requested,
            requested_by,
        }) => {
            assert_eq!(name, "liba");
            assert_eq!(context, Context::Host);
            assert_eq!(fixed, "liba/1.5#r15");
            assert_eq!(fixed_by, "<virtual root>");
            assert_eq!(requested, "liba/[<1.3]");
            assert_eq!(requested_by, "libb/1.0#rb");
        }
        other => panic!("expected version conflict, got {:?}", other),
    }
}

#[test]
fn test_stricter_range_conflicts_inside_tool_subtree() {
    let mut world = World::new(&[
        "liba/1.2#r12",
        "liba/1.5#r15",
        "app/1.0#ra",
        "tool/1.0#rt",
        "helper/1.0#rh",
    ]);
    world
        .recipe("liba/1.2", &[])
        .recipe("liba/1.5", &[])
        .recipe("helper/1.0", &["liba/[<1.3]"])
        .recipe("tool/1.0", &["liba/[>=1.0 <2.0]", "helper/1.0"])
        .declare(
            "app/1.0",
            RecipeDeclaration::new(PackageType::Application)
                .with_tool_requires(&["tool/1.0"])
                .unwrap(),
        );

    // liba/1.2 fixed in the host scope does not leak into the tool's scope
    match world.build(RootRequest::requires(&["liba/1.2", "app/1.0"]).unwrap()) {
        Err(GraphError::VersionConflict {
            name,
            context,
            fixed,
            fixed_by,
            requested_by,
            ..
        }) => {
            assert_eq!(name, "liba");
            assert_eq!(context, Context::Build);
            assert_eq!(fixed, "liba/1.5#r15");
            assert_eq!(fixed_by, "tool/1.0#rt");
            assert_eq!(requested_by, "helper/1.0#rh");
        }
        other => panic!("expected version conflict, got {:?}", other),
    }
}

#[test]
fn test_compatible_later_requirement_reuses_fixed_version() {
    let mut world = World::new(&["liba/1.2#r12", "liba/1.5#r15", "libb/1.0#rb"]);
    world
        .recipe("liba/1.5", &[])
        .recipe("libb/1.0", &["liba/[>=1.1]"]);

    let graph = world
        .build(RootRequest::requires(&["liba/[>=1.0 <2.0]", "libb/1.0"]).unwrap())
        .unwrap();
    let liba = only(&graph, "liba", Context::Host);
    assert_eq!(graph[liba].display_name(), "liba/1.5#r15");
}

#[test]
fn test_profile_override_wins_and_warns() {
    let mut world = World::new(&["liba/1.2#r12", "liba/1.5#r15", "libb/1.0#rb"]);
    world
        .recipe("liba/1.2", &[])
        .recipe("libb/1.0", &["liba/1.5"]);
    let host = Profile::default().with_override("liba", "1.2");
    let recorder = EventRecorder::new();

    let graph = world
        .build_with(
            RootRequest::requires(&["liba/[>=1.0 <2.0]", "libb/1.0"]).unwrap(),
            &host,
            &Profile::default(),
            None,
            &recorder,
        )
        .unwrap();

    let liba = only(&graph, "liba", Context::Host);
    assert_eq!(graph[liba].display_name(), "liba/1.2#r12");
    assert_eq!(graph.warnings().len(), 1);
    assert!(graph.warnings()[0].contains("libb/1.0#rb requires liba/1.5"));
    let overrides = recorder
        .events()
        .into_iter()
        .filter(|e| matches!(e, ResolutionEvent::OverrideApplied { .. }))
        .count();
    assert_eq!(overrides, 1);
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn test_dependency_loop_is_fatal() {
    let mut world = World::new(&["liba/1.0#ra", "libb/1.0#rb"]);
    world
        .recipe("liba/1.0", &["libb/1.0"])
        .recipe("libb/1.0", &["liba/1.0"]);

    match world.build(RootRequest::requires(&["liba/1.0"]).unwrap()) {
        Err(GraphError::Cycle { path }) => {
            assert_eq!(path, vec!["liba/1.0#ra", "libb/1.0#rb", "liba/1.0"]);
        }
        other => panic!("expected cycle, got {:?}", other),
    }
}

#[test]
fn test_profile_tool_requires_cycle_broken_by_negation() {
    let mut world = World::new(&["app/1.0#ra", "cmake/3.27#rc"]);
    world.recipe("app/1.0", &[]).recipe("cmake/3.27", &[]);
    let host = Profile::default().with_tool_requires("*", &["cmake/3.27"]);

    let looping = Profile::default().with_tool_requires("*", &["cmake/3.27"]);
    let result = world.build_with(
        RootRequest::requires(&["app/1.0"]).unwrap(),
        &host,
        &looping,
        None,
        &NullObserver,
    );
    assert!(matches!(result, Err(GraphError::Cycle { .. })));

    let negated = Profile::default().with_tool_requires("!cmake/*", &["cmake/3.27"]);
    let graph = world
        .build_with(
            RootRequest::requires(&["app/1.0"]).unwrap(),
            &host,
            &negated,
            None,
            &NullObserver,
        )
        .unwrap();
    let cmake = only(&graph, "cmake", Context::Build);
    assert!(graph[cmake].dependencies.is_empty());
    assert!(graph.validate_acyclic().is_ok());
}

// ============================================================================
// Host / build contexts
// ============================================================================

#[test]
fn test_tool_requires_resolve_in_build_context() {
    let mut world = World::new(&["app/1.0#ra", "cmake/3.27#rc"]);
    world.declare(
        "app/1.0",
        RecipeDeclaration::new(PackageType::Library)
            .with_tool_requires(&["cmake/3.27"])
            .unwrap()
            .with_settings(&["os"]),
    );
    world.declare(
        "cmake/3.27",
        RecipeDeclaration::new(PackageType::Application).with_settings(&["os"]),
    );
    let host = Profile::default().with_setting("os", "Windows");
    let build = Profile::default().with_setting("os", "Linux");

    let graph = world
        .build_with(
            RootRequest::requires(&["app/1.0"]).unwrap(),
            &host,
            &build,
            None,
            &NullObserver,
        )
        .unwrap();

    let app = only(&graph, "app", Context::Host);
    let cmake = only(&graph, "cmake", Context::Build);
    assert_eq!(graph[app].settings.get("os").map(String::as_str), Some("Windows"));
    assert_eq!(graph[cmake].settings.get("os").map(String::as_str), Some("Linux"));
    assert!(graph.find("cmake", Context::Host).is_empty());
}

#[test]
fn test_same_package_in_both_contexts_is_two_nodes() {
    let mut world = World::new(&["app/1.0#ra", "protobuf/3.21#rp"]);
    world.declare(
        "app/1.0",
        RecipeDeclaration::new(PackageType::Library)
            .with_requires(&["protobuf/3.21"])
            .unwrap()
            .with_tool_requires(&["protobuf/3.21"])
            .unwrap(),
    );
    world.recipe("protobuf/3.21", &[]);

    let graph = world.build(RootRequest::requires(&["app/1.0"]).unwrap()).unwrap();
    only(&graph, "protobuf", Context::Host);
    only(&graph, "protobuf", Context::Build);
}

#[test]
fn test_build_context_resolves_independently() {
    let mut world = World::new(&["app/1.0#ra", "zlib/1.2#r12", "zlib/1.3#r13", "tool/1.0#rt"]);
    world.declare(
        "app/1.0",
        RecipeDeclaration::new(PackageType::Library)
            .with_requires(&["zlib/1.2"])
            .unwrap()
            .with_tool_requires(&["tool/1.0"])
            .unwrap(),
    );
    world
        .recipe("tool/1.0", &["zlib/1.3"])
        .recipe("zlib/1.2", &[])
        .recipe("zlib/1.3", &[]);

    let graph = world.build(RootRequest::requires(&["app/1.0"]).unwrap()).unwrap();
    let host_zlib = only(&graph, "zlib", Context::Host);
    let build_zlib = only(&graph, "zlib", Context::Build);
    assert_eq!(graph[host_zlib].display_name(), "zlib/1.2#r12");
    assert_eq!(graph[build_zlib].display_name(), "zlib/1.3#r13");
}

// ============================================================================
// Trait propagation
// ============================================================================

#[test]
fn test_visible_dependencies_are_inherited() {
    let mut world = World::new(&["app/1.0#ra", "liba/1.0#r1", "zlib/1.3#rz", "cmake/3.27#rc", "gtest/1.14#rg"]);
    world.recipe("app/1.0", &["liba/1.0"]);
    world.declare(
        "liba/1.0",
        RecipeDeclaration::new(PackageType::Library)
            .with_requires(&["zlib/1.3"])
            .unwrap()
            .with_test_requires(&["gtest/1.14"])
            .unwrap()
            .with_tool_requires(&["cmake/3.27"])
            .unwrap(),
    );
    world
        .recipe("zlib/1.3", &[])
        .recipe("cmake/3.27", &[])
        .recipe("gtest/1.14", &[]);

    let graph = world.build(RootRequest::requires(&["app/1.0"]).unwrap()).unwrap();
    let app = only(&graph, "app", Context::Host);
    let liba = only(&graph, "liba", Context::Host);

    assert_eq!(dependency_names(&graph, liba), vec!["zlib", "gtest", "cmake"]);
    assert_eq!(dependency_names(&graph, app), vec!["liba", "zlib"]);
    let inherited = &graph[app].dependencies[1];
    assert!(!inherited.edge.traits.direct);
    assert!(inherited.edge.traits.visible);

    let root = graph.root();
    assert_eq!(dependency_names(&graph, root), vec!["app", "liba", "zlib"]);
}

// ============================================================================
// Package IDs
// ============================================================================

#[test]
fn test_package_ids_are_assigned_and_deterministic() {
    let mut world = World::new(&["app/1.0#ra", "liba/1.0#r1", "zlib/1.3#rz", "hdr/1.0#rh"]);
    world
        .recipe("app/1.0", &["liba/1.0", "hdr/1.0"])
        .recipe("liba/1.0", &["zlib/1.3"])
        .recipe("zlib/1.3", &[])
        .declare("hdr/1.0", RecipeDeclaration::new(PackageType::HeaderLibrary));

    let first = world.build(RootRequest::requires(&["app/1.0"]).unwrap()).unwrap();
    let second = world.build(RootRequest::requires(&["app/1.0"]).unwrap()).unwrap();

    for node in first.nodes().filter(|n| n.reference.is_some()) {
        let twin = only(&second, node.name().unwrap(), node.context);
        assert!(node.package_id.is_some());
        assert_eq!(node.package_id, second[twin].package_id);
    }
    assert_eq!(first[first.root()].package_id, None);
    let hdr = only(&first, "hdr", Context::Host);
    assert_eq!(
        first[hdr].package_id.as_ref().map(|p| p.as_str()),
        Some(CONFIGURATION_INDEPENDENT_ID)
    );
}

#[test]
fn test_requirement_order_does_not_change_package_id() {
    let revisions = ["app/1.0#ra", "zlib/1.3#rz", "fmt/10.1#rf"];
    let mut forward = World::new(&revisions);
    forward
        .recipe("app/1.0", &["zlib/1.3", "fmt/10.1"])
        .recipe("zlib/1.3", &[])
        .recipe("fmt/10.1", &[]);
    let mut reverse = World::new(&revisions);
    reverse
        .recipe("app/1.0", &["fmt/10.1", "zlib/1.3"])
        .recipe("zlib/1.3", &[])
        .recipe("fmt/10.1", &[]);

    let a = forward.build(RootRequest::requires(&["app/1.0"]).unwrap()).unwrap();
    let b = reverse.build(RootRequest::requires(&["app/1.0"]).unwrap()).unwrap();
    assert_eq!(
        a[only(&a, "app", Context::Host)].package_id,
        b[only(&b, "app", Context::Host)].package_id
    );
}

#[test]
fn test_consumer_root_gets_package_id() {
    let mut world = World::new(&["zlib/1.3#rz"]);
    world.recipe("zlib/1.3", &[]);
    let root = RootRequest::Consumer {
        reference: PackageReference::parse("myapp/0.1").unwrap(),
        declaration: RecipeDeclaration::new(PackageType::Application)
            .with_requires(&["zlib/1.3"])
            .unwrap(),
    };

    let graph = world.build(root).unwrap();
    let root = graph.root();
    assert_eq!(graph[root].origin, NodeOrigin::Consumer);
    assert!(graph[root].package_id.is_some());
    assert_eq!(graph.build_order_references().unwrap(), vec![vec!["zlib/1.3#rz (host)".to_string()]]);
}

#[test]
fn test_locked_package_id_mismatch_is_a_warning() {
    let mut world = World::new(&["zlib/1.3#rz"]);
    world.recipe("zlib/1.3", &[]);
    let mut lockfile = Lockfile::new();
    lockfile.add(
        LockedEntry::new(PackageReference::parse("zlib/1.3#rz").unwrap())
            .with_context(Context::Host)
            .with_package_id(PackageId::new("stale")),
    );
    let recorder = EventRecorder::new();

    let graph = world
        .build_with(
            RootRequest::requires(&["zlib/1.3"]).unwrap(),
            &Profile::default(),
            &Profile::default(),
            Some(LockedResolution::strict(&lockfile)),
            &recorder,
        )
        .unwrap();

    assert_eq!(graph.warnings().len(), 1);
    assert!(recorder
        .events()
        .iter()
        .any(|e| matches!(e, ResolutionEvent::LockedPackageIdMismatch { locked, .. } if locked == "stale")));
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_cancelled_build_returns_no_graph() {
    let mut world = World::new(&["zlib/1.3#rz"]);
    world.recipe("zlib/1.3", &[]);
    let cancel = CancelFlag::new();
    cancel.cancel();

    let result = GraphBuilder::new(&world.sources, &world.recipes, &NullObserver)
        .with_cancel_flag(cancel.clone())
        .build(
            RootRequest::requires(&["zlib/1.3"]).unwrap(),
            &Profile::default(),
            &Profile::default(),
            None,
        );
    assert!(matches!(result, Err(GraphError::Cancelled)));
    assert!(cancel.is_cancelled());
}
