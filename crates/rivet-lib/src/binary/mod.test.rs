use super::*;
use crate::graph::{Dependency, GraphNode, NodeOrigin};
use crate::observer::{EventRecorder, NullObserver};
use crate::primitives::Context;
use crate::recipe::RequireEdge;
use crate::testing::MemorySource;
use std::sync::Arc;

// ============================================================================
// Test Utilities
// ============================================================================

struct Fixture {
    graph: DependencyGraph,
    zlib: NodeId,
    liba: NodeId,
    app: NodeId,
}

/// root -> app -> liba -> zlib, each with a package ID
fn chain() -> Fixture {
    let mut graph = DependencyGraph::with_root(GraphNode::new(
        None,
        Context::Host,
        NodeOrigin::VirtualRoot,
    ));
    let mut previous = graph.root();
    let mut ids = Vec::new();
    for text in ["app/1.0#a", "liba/1.0#b", "zlib/1.3#c"] {
        let mut node = GraphNode::new(
            Some(PackageReference::parse(text).unwrap()),
            Context::Host,
            NodeOrigin::Cache,
        );
        node.package_id = Some(PackageId::new(&format!("pid-{}", text.split('/').next().unwrap())));
        let id = graph.add_node(node);
        graph.node_mut(previous).dependencies.push(Dependency {
            edge: RequireEdge::requires(text).unwrap(),
            target: id,
        });
        ids.push(id);
        previous = id;
    }
    Fixture {
        graph,
        app: ids[0],
        liba: ids[1],
        zlib: ids[2],
    }
}

fn policy(directives: &[&str]) -> BuildPolicy {
    BuildPolicy::parse(directives).unwrap()
}

fn add_binary(source: &MemorySource, graph: &DependencyGraph, id: NodeId) {
    let node = &graph[id];
    source.add_binary(
        node.reference.as_ref().unwrap(),
        node.package_id.as_ref().unwrap(),
    );
}

// ============================================================================
// Policy parsing
// ============================================================================

#[test]
fn test_parse_directives() {
    let parsed = policy(&["never", "missing", "cascade", "zlib/*", "!fmt/*", "missing:boost/*"]);
    let rendered: Vec<String> = parsed.directives().iter().map(|d| d.to_string()).collect();
    assert_eq!(
        rendered,
        vec!["never", "missing", "cascade", "zlib/*", "!fmt/*", "missing:boost/*"]
    );
    assert!(parsed.cascades());
    assert!(matches!(
        PolicyDirective::parse("  "),
        Err(PolicyError::EmptyDirective)
    ));
    assert!(matches!(
        PolicyDirective::parse("zlib/[*"),
        Err(PolicyError::InvalidPattern { .. })
    ));
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn test_default_policy_reuses_cache_then_remote() {
    let mut fixture = chain();
    let cache = Arc::new(MemorySource::new("cache"));
    let remote = Arc::new(MemorySource::new("center"));
    add_binary(&cache, &fixture.graph, fixture.zlib);
    add_binary(&remote, &fixture.graph, fixture.liba);
    let sources = SourceSet::new(cache).with_remote(remote);

    BinaryAnalyzer::new(&sources, &NullObserver).analyze(&mut fixture.graph, &BuildPolicy::default());

    let graph = &fixture.graph;
    assert_eq!(graph[fixture.zlib].binary_status, Some(BinaryStatus::Cache));
    assert_eq!(graph[fixture.liba].binary_status, Some(BinaryStatus::Download));
    assert_eq!(graph[fixture.liba].binary_remote.as_deref(), Some("center"));
    assert_eq!(graph[fixture.app].binary_status, Some(BinaryStatus::Missing));
    assert_eq!(graph[graph.root()].binary_status, None);
}

#[test]
fn test_never_policy_marks_missing_and_caller_raises() {
    let mut fixture = chain();
    let cache = Arc::new(MemorySource::new("cache"));
    add_binary(&cache, &fixture.graph, fixture.zlib);
    add_binary(&cache, &fixture.graph, fixture.app);
    let sources = SourceSet::new(cache);

    BinaryAnalyzer::new(&sources, &NullObserver).analyze(&mut fixture.graph, &policy(&["never"]));

    assert_eq!(fixture.graph[fixture.liba].binary_status, Some(BinaryStatus::Missing));
    let error = ensure_no_missing(&fixture.graph).unwrap_err();
    assert_eq!(error.missing, vec!["liba/1.0#b:pid-liba".to_string()]);
}

#[test]
fn test_missing_policy_builds_absent_binaries() {
    let mut fixture = chain();
    let cache = Arc::new(MemorySource::new("cache"));
    add_binary(&cache, &fixture.graph, fixture.zlib);
    let sources = SourceSet::new(cache);

    BinaryAnalyzer::new(&sources, &NullObserver).analyze(&mut fixture.graph, &policy(&["missing"]));

    let graph = &fixture.graph;
    assert_eq!(graph[fixture.zlib].binary_status, Some(BinaryStatus::Cache));
    assert_eq!(graph[fixture.liba].binary_status, Some(BinaryStatus::Build));
    assert_eq!(graph[fixture.app].binary_status, Some(BinaryStatus::Build));
    assert!(ensure_no_missing(graph).is_ok());
}

#[test]
fn test_pattern_forces_build_even_with_cached_binary() {
    let mut fixture = chain();
    let cache = Arc::new(MemorySource::new("cache"));
    for id in [fixture.zlib, fixture.liba, fixture.app] {
        add_binary(&cache, &fixture.graph, id);
    }
    let sources = SourceSet::new(cache);

    BinaryAnalyzer::new(&sources, &NullObserver).analyze(&mut fixture.graph, &policy(&["zlib/*"]));

    let graph = &fixture.graph;
    assert_eq!(graph[fixture.zlib].binary_status, Some(BinaryStatus::Build));
    assert_eq!(graph[fixture.liba].binary_status, Some(BinaryStatus::Cache));
}

#[test]
fn test_cascade_rebuilds_consumers_of_built_nodes() {
    let mut fixture = chain();
    let cache = Arc::new(MemorySource::new("cache"));
    for id in [fixture.zlib, fixture.liba, fixture.app] {
        add_binary(&cache, &fixture.graph, id);
    }
    let sources = SourceSet::new(cache);

    BinaryAnalyzer::new(&sources, &NullObserver)
        .analyze(&mut fixture.graph, &policy(&["zlib/*", "cascade"]));

    let graph = &fixture.graph;
    assert_eq!(graph[fixture.zlib].binary_status, Some(BinaryStatus::Build));
    assert_eq!(graph[fixture.liba].binary_status, Some(BinaryStatus::Build));
    assert_eq!(graph[fixture.app].binary_status, Some(BinaryStatus::Build));
}

#[test]
fn test_negated_pattern_is_exempt_from_cascade() {
    let mut fixture = chain();
    let cache = Arc::new(MemorySource::new("cache"));
    for id in [fixture.zlib, fixture.liba, fixture.app] {
        add_binary(&cache, &fixture.graph, id);
    }
    let sources = SourceSet::new(cache);

    BinaryAnalyzer::new(&sources, &NullObserver)
        .analyze(&mut fixture.graph, &policy(&["!liba/*", "zlib/*", "cascade"]));

    let graph = &fixture.graph;
    assert_eq!(graph[fixture.zlib].binary_status, Some(BinaryStatus::Build));
    assert_eq!(graph[fixture.liba].binary_status, Some(BinaryStatus::Cache));
    assert_eq!(graph[fixture.app].binary_status, Some(BinaryStatus::Cache));
}

#[test]
fn test_lookup_failures_count_as_absent() {
    let mut fixture = chain();
    let cache = Arc::new(MemorySource::new("cache"));
    let remote = Arc::new(MemorySource::new("flaky"));
    remote.add_any_binary("zlib");
    remote.set_failing(true);
    let sources = SourceSet::new(cache).with_remote(remote);
    let recorder = EventRecorder::new();

    BinaryAnalyzer::new(&sources, &recorder).analyze(&mut fixture.graph, &BuildPolicy::default());

    assert_eq!(fixture.graph[fixture.zlib].binary_status, Some(BinaryStatus::Missing));
    let events = recorder.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, ResolutionEvent::BinaryLookupFailed { source, .. } if source == "flaky")));
    let classified = events
        .iter()
        .filter(|e| matches!(e, ResolutionEvent::BinaryClassified { .. }))
        .count();
    assert_eq!(classified, 3);
}
