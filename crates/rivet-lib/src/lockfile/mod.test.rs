use super::*;
use crate::graph::{Dependency, GraphNode, NodeOrigin};
use crate::recipe::RequireEdge;
use std::fs;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

fn reference(text: &str) -> PackageReference {
    PackageReference::parse(text).unwrap()
}

fn entry(text: &str, context: Context) -> LockedEntry {
    LockedEntry::new(reference(text)).with_context(context)
}

fn graph_of(nodes: &[(&str, Context)]) -> DependencyGraph {
    let mut graph = DependencyGraph::with_root(GraphNode::new(
        None,
        Context::Host,
        NodeOrigin::VirtualRoot,
    ));
    let root = graph.root();
    for (text, context) in nodes {
        let mut node = GraphNode::new(Some(reference(text)), *context, NodeOrigin::Cache);
        node.package_id = Some(PackageId::new("pid"));
        let id = graph.add_node(node);
        graph.node_mut(root).dependencies.push(Dependency {
            edge: RequireEdge::requires(text).unwrap(),
            target: id,
        });
    }
    graph
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_render_document_shape() {
    let mut lockfile = Lockfile::new();
    lockfile.add(
        LockedEntry::new(reference("zlib/1.3#abc%1700000000"))
            .with_context(Context::Host)
            .with_package_id(PackageId::new("p1")),
    );
    lockfile.add(LockedEntry::new(reference("cmake/3.27#def")));

    let text = lockfile.render().unwrap();
    assert!(text.ends_with("}\n"));

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["version"], LOCKFILE_VERSION);
    assert_eq!(value["entries"][0]["ref"], "zlib/1.3#abc%1700000000");
    assert_eq!(value["entries"][0]["package_id"], "p1");
    assert_eq!(value["entries"][0]["context"], "host");
    assert!(value["entries"][1].get("package_id").is_none());
    assert!(value["entries"][1].get("context").is_none());
}

#[test]
fn test_save_load_is_byte_stable() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("rivet.lock");

    let mut lockfile = Lockfile::new();
    lockfile.add(entry("zlib/1.3@acme/stable#abc%1700000000", Context::Host));
    lockfile.add(entry("cmake/3.27#def", Context::Build));
    lockfile.save(&path).unwrap();
    let first = fs::read_to_string(&path).unwrap();

    let loaded = Lockfile::load(&path).unwrap();
    assert_eq!(loaded, lockfile);
    loaded.save(&path).unwrap();
    let second = fs::read_to_string(&path).unwrap();

    Lockfile::load(&path).unwrap().save(&path).unwrap();
    let third = fs::read_to_string(&path).unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn test_parse_rejects_unknown_version() {
    let result = Lockfile::parse(r#"{"version": "9.9", "entries": []}"#);
    assert!(matches!(
        result,
        Err(LockfileError::UnsupportedVersion { ref version }) if version == "9.9"
    ));
}

#[test]
fn test_parse_rejects_bad_reference() {
    let result = Lockfile::parse(
        r#"{"version": "0.1", "entries": [{"ref": "not a reference"}]}"#,
    );
    assert!(matches!(result, Err(LockfileError::InvalidReference { .. })));

    assert!(matches!(
        Lockfile::parse("{ nope"),
        Err(LockfileError::Json { .. })
    ));
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = Lockfile::load(&temp_dir.path().join("absent.lock"));
    assert!(matches!(result, Err(LockfileError::Io { .. })));
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_locked_for_respects_context() {
    let mut lockfile = Lockfile::new();
    lockfile.add(entry("protobuf/3.21#a", Context::Host));
    lockfile.add(entry("protobuf/3.20#b", Context::Build));
    lockfile.add(LockedEntry::new(reference("protobuf/3.19#c")));

    let host: Vec<String> = lockfile
        .locked_for("protobuf", Context::Host)
        .iter()
        .map(|e| e.reference.to_string())
        .collect();
    assert_eq!(host, vec!["protobuf/3.21#a", "protobuf/3.19#c"]);
    assert_eq!(lockfile.locked_for("protobuf", Context::Build).len(), 2);
    assert!(lockfile.locked_for("zlib", Context::Host).is_empty());
}

#[test]
fn test_add_ignores_duplicates() {
    let mut lockfile = Lockfile::new();
    lockfile.add(entry("zlib/1.3#a", Context::Host));
    lockfile.add(entry("zlib/1.3#a", Context::Host));
    lockfile.add(entry("zlib/1.3#a", Context::Build));
    assert_eq!(lockfile.len(), 2);
}

#[test]
fn test_package_id_for() {
    let mut lockfile = Lockfile::new();
    lockfile.add(entry("zlib/1.3#a", Context::Host).with_package_id(PackageId::new("p1")));

    assert_eq!(
        lockfile.package_id_for(&reference("zlib/1.3#a"), Context::Host),
        Some(&PackageId::new("p1"))
    );
    assert_eq!(
        lockfile.package_id_for(&reference("zlib/1.3#a"), Context::Build),
        None
    );
}

// ============================================================================
// Update and merge
// ============================================================================

#[test]
fn test_update_replaces_same_name_and_keeps_unrelated() {
    let mut lockfile = Lockfile::new();
    lockfile.add(entry("zlib/1.2#old", Context::Host));
    lockfile.add(entry("bzip2/1.0#keep", Context::Host));

    let graph = graph_of(&[("zlib/1.3#new", Context::Host), ("cmake/3.27#c", Context::Build)]);
    lockfile.update(&graph, false);

    let refs: Vec<String> = lockfile
        .entries()
        .iter()
        .map(|e| e.reference.to_string())
        .collect();
    assert_eq!(refs, vec!["cmake/3.27#c", "zlib/1.3#new", "bzip2/1.0#keep"]);
    assert_eq!(lockfile.entries()[0].context, Some(Context::Build));
    assert_eq!(
        lockfile.entries()[1].package_id,
        Some(PackageId::new("pid"))
    );
}

#[test]
fn test_update_clean_discards_unused_entries() {
    let mut lockfile = Lockfile::new();
    lockfile.add(entry("bzip2/1.0#gone", Context::Host));

    let graph = graph_of(&[("zlib/1.3#new", Context::Host)]);
    lockfile.update(&graph, true);

    assert_eq!(lockfile.len(), 1);
    assert_eq!(lockfile.entries()[0].reference.to_string(), "zlib/1.3#new");
}

#[test]
fn test_update_skips_root_nodes() {
    let mut graph = graph_of(&[("zlib/1.3#a", Context::Host)]);
    let root = graph.root();
    graph.node_mut(root).reference = Some(reference("app/1.0"));
    graph.node_mut(root).origin = NodeOrigin::Consumer;

    let mut lockfile = Lockfile::new();
    lockfile.update(&graph, false);
    assert_eq!(lockfile.len(), 1);
}

#[test]
fn test_merge_is_a_union() {
    let mut left = Lockfile::new();
    left.add(entry("zlib/1.3#a", Context::Host));
    left.add(entry("fmt/10.1#b", Context::Host));

    let mut right = Lockfile::new();
    right.add(entry("fmt/10.1#b", Context::Host));
    right.add(entry("cmake/3.27#c", Context::Build));

    left.merge(&right);
    let refs: Vec<String> = left
        .entries()
        .iter()
        .map(|e| e.reference.to_string())
        .collect();
    assert_eq!(refs, vec!["zlib/1.3#a", "fmt/10.1#b", "cmake/3.27#c"]);
}
