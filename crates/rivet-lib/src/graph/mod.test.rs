// Tests for the dependency graph arena, acyclicity and build order

use super::*;

// ============================================================================
// Test Utilities
// ============================================================================

fn node(text: &str, context: Context) -> GraphNode {
    GraphNode::new(
        Some(PackageReference::parse(text).unwrap()),
        context,
        NodeOrigin::Cache,
    )
}

fn link(graph: &mut DependencyGraph, from: NodeId, to: NodeId, requirement: &str) {
    graph.node_mut(from).dependencies.push(Dependency {
        edge: RequireEdge::requires(requirement).unwrap(),
        target: to,
    });
}

fn tool_link(graph: &mut DependencyGraph, from: NodeId, to: NodeId, requirement: &str) {
    graph.node_mut(from).dependencies.push(Dependency {
        edge: RequireEdge::tool_requires(requirement).unwrap(),
        target: to,
    });
}

/// root -> app -> {liba, libb}; liba -> zlib; libb -> zlib
fn diamond() -> (DependencyGraph, [NodeId; 4]) {
    let mut graph = DependencyGraph::with_root(GraphNode::new(
        None,
        Context::Host,
        NodeOrigin::VirtualRoot,
    ));
    let root = graph.root();
    let app = graph.add_node(node("app/1.0#a", Context::Host));
    let liba = graph.add_node(node("liba/1.0#b", Context::Host));
    let libb = graph.add_node(node("libb/1.0#c", Context::Host));
    let zlib = graph.add_node(node("zlib/1.3#d", Context::Host));
    link(&mut graph, root, app, "app/1.0");
    link(&mut graph, app, liba, "liba/1.0");
    link(&mut graph, app, libb, "libb/1.0");
    link(&mut graph, liba, zlib, "zlib/1.3");
    link(&mut graph, libb, zlib, "zlib/1.3");
    (graph, [app, liba, libb, zlib])
}

// ============================================================================
// Arena access
// ============================================================================

#[test]
fn test_arena_assigns_sequential_ids() {
    let (graph, [app, _, _, zlib]) = diamond();
    assert_eq!(graph.root().index(), 0);
    assert_eq!(app.index(), 1);
    assert_eq!(graph.node_count(), 5);
    assert_eq!(graph.edge_count(), 5);
    assert_eq!(graph[zlib].name(), Some("zlib"));
    assert_eq!(graph[graph.root()].display_name(), "<virtual root>");
}

#[test]
fn test_find_and_dependents() {
    let (graph, [_, liba, libb, zlib]) = diamond();
    assert_eq!(graph.find("zlib", Context::Host), vec![zlib]);
    assert!(graph.find("zlib", Context::Build).is_empty());
    assert_eq!(graph.dependents_of(zlib), vec![liba, libb]);
    assert!(graph[liba].dependency_named("zlib").is_some());
}

#[test]
fn test_dependency_first_order_visits_dependencies_first() {
    let (graph, [app, liba, libb, zlib]) = diamond();
    let order = graph.dependency_first_order();
    let position = |id: NodeId| order.iter().position(|n| *n == id).unwrap();

    assert_eq!(order.len(), 5);
    assert!(position(zlib) < position(liba));
    assert!(position(zlib) < position(libb));
    assert!(position(liba) < position(app));
    assert_eq!(*order.last().unwrap(), graph.root());
}

// ============================================================================
// Acyclicity
// ============================================================================

#[test]
fn test_validate_acyclic_accepts_diamond() {
    let (graph, _) = diamond();
    assert!(graph.validate_acyclic().is_ok());
}

#[test]
fn test_validate_acyclic_reports_cycle_path() {
    let (mut graph, [_, liba, _, zlib]) = diamond();
    link(&mut graph, zlib, liba, "liba/1.0");

    match graph.validate_acyclic() {
        Err(GraphError::Cycle { path }) => {
            assert_eq!(path.first(), path.last());
            assert!(path.iter().any(|p| p.starts_with("zlib/1.3")));
            assert!(path.iter().any(|p| p.starts_with("liba/1.0")));
        }
        other => panic!("expected cycle, got {:?}", other),
    }
}

#[test]
fn test_build_edges_are_exempt_from_same_context_check() {
    let (mut graph, [_, liba, _, zlib]) = diamond();
    tool_link(&mut graph, zlib, liba, "liba/1.0");
    assert!(graph.validate_acyclic().is_ok());

    let protoc = graph.add_node(node("protoc/3.21#e", Context::Build));
    let zlib_build = graph.add_node(node("zlib/1.3#d", Context::Build));
    tool_link(&mut graph, liba, protoc, "protoc/3.21");
    link(&mut graph, protoc, zlib_build, "zlib/1.3");
    link(&mut graph, zlib_build, liba, "liba/1.0");
    assert!(graph.validate_acyclic().is_ok());
}

// ============================================================================
// Build order
// ============================================================================

#[test]
fn test_build_order_levels() {
    let (graph, [app, liba, libb, zlib]) = diamond();
    let levels = graph.build_order().unwrap();

    assert_eq!(levels, vec![vec![zlib], vec![liba, libb], vec![app]]);
}

#[test]
fn test_build_order_uses_longest_path() {
    let (mut graph, [app, liba, _, zlib]) = diamond();
    // app also depends on zlib directly; it must still come after liba
    link(&mut graph, app, zlib, "zlib/1.3");
    let levels = graph.build_order().unwrap();

    let level_of = |id: NodeId| levels.iter().position(|l| l.contains(&id)).unwrap();
    assert_eq!(level_of(zlib), 0);
    assert_eq!(level_of(liba), 1);
    assert_eq!(level_of(app), 2);
}

#[test]
fn test_build_order_excludes_roots_and_renders_references() {
    let (mut graph, _) = diamond();
    let root = graph.root();
    graph.node_mut(root).origin = NodeOrigin::Consumer;

    let rendered = graph.build_order_references().unwrap();
    assert_eq!(rendered[0], vec!["zlib/1.3#d (host)".to_string()]);
    assert_eq!(
        rendered[1],
        vec!["liba/1.0#b (host)".to_string(), "libb/1.0#c (host)".to_string()]
    );
    assert!(rendered.iter().flatten().all(|r| !r.contains("virtual")));
}

#[test]
fn test_build_order_on_empty_graph() {
    let graph = DependencyGraph::with_root(GraphNode::new(
        None,
        Context::Host,
        NodeOrigin::VirtualRoot,
    ));
    assert!(graph.build_order().unwrap().is_empty());
}

#[test]
fn test_build_order_rejects_cycles() {
    let (mut graph, [_, liba, _, zlib]) = diamond();
    link(&mut graph, zlib, liba, "liba/1.0");
    assert!(matches!(graph.build_order(), Err(GraphError::Cycle { .. })));
}
