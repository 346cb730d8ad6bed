use super::*;
use crate::graph::{Dependency, GraphNode, NodeOrigin};
use crate::primitives::Context;
use crate::recipe::{OptionDeclaration, PackageType};

// ============================================================================
// Test Utilities
// ============================================================================

fn reference(text: &str) -> PackageReference {
    PackageReference::parse(text).unwrap()
}

fn edge(text: &str) -> RequireEdge {
    RequireEdge::requires(text).unwrap()
}

/// Graph with a consumer node `app` depending on each `(requirement, dep ref)`
fn consumer_graph(deps: &[(&str, &str)]) -> (DependencyGraph, NodeId) {
    let root = GraphNode::new(None, Context::Host, NodeOrigin::VirtualRoot);
    let mut graph = DependencyGraph::with_root(root);

    let mut app = GraphNode::new(Some(reference("app/1.0#r1")), Context::Host, NodeOrigin::Cache);
    app.settings.insert("os".to_string(), "Linux".to_string());
    app.settings.insert("arch".to_string(), "x86_64".to_string());
    let app_id = graph.add_node(app);

    for (requirement, resolved) in deps {
        let mut dep = GraphNode::new(Some(reference(resolved)), Context::Host, NodeOrigin::Cache);
        dep.package_id = Some(PackageId::new("dep-package-id"));
        let dep_id = graph.add_node(dep);
        graph.node_mut(app_id).dependencies.push(Dependency {
            edge: edge(requirement),
            target: dep_id,
        });
    }
    (graph, app_id)
}

// ============================================================================
// Canonical text and hashing
// ============================================================================

#[test]
fn test_requires_order_does_not_change_package_id() {
    let (forward, forward_app) = consumer_graph(&[("zlib/1.3", "zlib/1.3#a"), ("fmt/10.1", "fmt/10.1#b")]);
    let (reverse, reverse_app) = consumer_graph(&[("fmt/10.1", "fmt/10.1#b"), ("zlib/1.3", "zlib/1.3#a")]);

    let identifier = PackageIdentifier::default();
    let a = identifier.compute(&forward, forward_app).unwrap();
    let b = identifier.compute(&reverse, reverse_app).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 64);
}

#[test]
fn test_canonical_text_sorts_sections() {
    let (graph, app) = consumer_graph(&[("zlib/1.3", "zlib/1.3#a"), ("fmt/10.1", "fmt/10.1#b")]);
    let info = PackageIdentifier::default().info(&graph, app).unwrap();
    let text = info.canonical_text();

    assert_eq!(
        text,
        "[settings]\narch=x86_64\nos=Linux\n[options]\n[requires]\nfmt/10.Y.Z\nzlib/1.Y.Z\n"
    );
}

#[test]
fn test_settings_change_package_id() {
    let (graph, app) = consumer_graph(&[]);
    let mut other = graph.clone();
    other
        .node_mut(app)
        .settings
        .insert("os".to_string(), "Windows".to_string());

    let identifier = PackageIdentifier::default();
    assert_ne!(
        identifier.compute(&graph, app).unwrap(),
        identifier.compute(&other, app).unwrap()
    );
}

#[test]
fn test_header_library_gets_configuration_independent_id() {
    let (mut graph, app) = consumer_graph(&[("zlib/1.3", "zlib/1.3#a")]);
    graph.node_mut(app).package_type = PackageType::HeaderLibrary;

    let id = PackageIdentifier::default().compute(&graph, app).unwrap();
    assert_eq!(id.as_str(), CONFIGURATION_INDEPENDENT_ID);
    assert_eq!(id, PackageId::configuration_independent());
}

#[test]
fn test_configuration_independent_constant_is_empty_digest() {
    let info = PackageInfo::default();
    let digest = Sha256::digest(b"");
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    assert_eq!(hex, CONFIGURATION_INDEPENDENT_ID);
    assert_ne!(info.package_id().as_str(), CONFIGURATION_INDEPENDENT_ID);
}

// ============================================================================
// Package ID modes
// ============================================================================

#[test]
fn test_contribution_per_mode() {
    let zlib = reference("zlib/1.2.13#abc");
    let id = PackageId::new("deadbeef");

    assert_eq!(
        contribution(&zlib, Some(&id), PackageIdMode::Full),
        Contribution::Text("zlib/1.2.13#abc:deadbeef".to_string())
    );
    assert_eq!(
        contribution(&zlib, None, PackageIdMode::Patch),
        Contribution::Text("zlib/1.2.13".to_string())
    );
    assert_eq!(
        contribution(&zlib, None, PackageIdMode::Minor),
        Contribution::Text("zlib/1.2.Z".to_string())
    );
    assert_eq!(
        contribution(&zlib, None, PackageIdMode::Semver),
        Contribution::Text("zlib/1.Y.Z".to_string())
    );
    assert_eq!(
        contribution(&zlib, None, PackageIdMode::Unrelated),
        Contribution::Excluded
    );
    assert_eq!(
        contribution(&zlib, None, PackageIdMode::Full),
        Contribution::MissingPackageId
    );
}

#[test]
fn test_semver_mode_keeps_full_version_below_one() {
    let early = reference("tiny/0.4.1@acme/stable#r");
    assert_eq!(
        contribution(&early, None, PackageIdMode::Semver),
        Contribution::Text("tiny/0.4.1@acme/stable".to_string())
    );
}

#[test]
fn test_semver_mode_ignores_minor_bumps() {
    let (old, old_app) = consumer_graph(&[("zlib/[>=1.0 <2]", "zlib/1.2#a")]);
    let (new, new_app) = consumer_graph(&[("zlib/[>=1.0 <2]", "zlib/1.3#b")]);

    let semver = PackageIdentifier::default();
    assert_eq!(
        semver.compute(&old, old_app).unwrap(),
        semver.compute(&new, new_app).unwrap()
    );

    let minor = PackageIdentifier::new(PackageIdMode::Minor);
    assert_ne!(
        minor.compute(&old, old_app).unwrap(),
        minor.compute(&new, new_app).unwrap()
    );
}

#[test]
fn test_mode_for_prefers_recipe_override() {
    let identifier = PackageIdentifier::new(PackageIdMode::Minor);
    let mut modes = BTreeMap::new();
    modes.insert("zlib".to_string(), PackageIdMode::Full);

    assert_eq!(identifier.mode_for(&modes, &edge("zlib/1.3")), PackageIdMode::Full);
    assert_eq!(identifier.mode_for(&modes, &edge("fmt/10.1")), PackageIdMode::Minor);

    let tool = RequireEdge::tool_requires("cmake/3.27").unwrap();
    assert_eq!(identifier.mode_for(&modes, &tool), PackageIdMode::Unrelated);
    let test = RequireEdge::test_requires("gtest/1.14").unwrap();
    assert_eq!(identifier.mode_for(&modes, &test), PackageIdMode::Unrelated);
}

#[test]
fn test_tool_requires_do_not_affect_package_id() {
    let (plain, app) = consumer_graph(&[]);
    let mut with_tool = plain.clone();
    let cmake = with_tool.add_node(GraphNode::new(
        Some(reference("cmake/3.27#c")),
        Context::Build,
        NodeOrigin::Cache,
    ));
    with_tool.node_mut(app).dependencies.push(Dependency {
        edge: RequireEdge::tool_requires("cmake/3.27").unwrap(),
        target: cmake,
    });

    let identifier = PackageIdentifier::default();
    assert_eq!(
        identifier.compute(&plain, app).unwrap(),
        identifier.compute(&with_tool, app).unwrap()
    );
}

#[test]
fn test_full_mode_requires_dependency_package_id() {
    let (mut graph, app) = consumer_graph(&[("zlib/1.3", "zlib/1.3#a")]);
    let zlib = graph[app].dependencies[0].target;
    graph.node_mut(zlib).package_id = None;
    graph
        .node_mut(app)
        .package_id_modes
        .insert("zlib".to_string(), PackageIdMode::Full);

    let result = PackageIdentifier::default().compute(&graph, app);
    assert!(matches!(
        result,
        Err(PackageIdentityError::MissingDependencyId { .. })
    ));
}

// ============================================================================
// Option resolution
// ============================================================================

#[test]
fn test_resolve_options_uses_defaults_and_profile_values() {
    let declaration = RecipeDeclaration::new(PackageType::Library)
        .with_option("shared", OptionDeclaration::new(&["True", "False"], Some("False")))
        .with_option("fPIC", OptionDeclaration::new(&["True", "False"], Some("True")));
    let profile = Profile::default().with_option("zlib/*:shared", "True");

    let options = resolve_options(&profile, &reference("zlib/1.3"), &declaration).unwrap();
    assert_eq!(options.get("shared").map(String::as_str), Some("True"));
    assert_eq!(options.get("fPIC").map(String::as_str), Some("True"));
}

#[test]
fn test_resolve_options_rejects_unknown_value() {
    let declaration = RecipeDeclaration::new(PackageType::Library)
        .with_option("shared", OptionDeclaration::new(&["True", "False"], Some("False")));
    let profile = Profile::default().with_option("*:shared", "Maybe");

    let error = resolve_options(&profile, &reference("zlib/1.3"), &declaration).unwrap_err();
    assert!(matches!(
        error,
        PackageIdentityError::InvalidOptionValue { ref value, .. } if value == "Maybe"
    ));
}

#[test]
fn test_resolve_options_requires_a_value() {
    let declaration =
        RecipeDeclaration::new(PackageType::Library).with_option("variant", OptionDeclaration::new(&[], None));

    let error = resolve_options(&Profile::default(), &reference("zlib/1.3"), &declaration).unwrap_err();
    assert!(matches!(error, PackageIdentityError::MissingOptionValue { .. }));
}

#[test]
fn test_profile_options_not_declared_are_ignored() {
    let declaration = RecipeDeclaration::new(PackageType::Library);
    let profile = Profile::default().with_option("*:shared", "True");

    let options = resolve_options(&profile, &reference("zlib/1.3"), &declaration).unwrap();
    assert!(options.is_empty());
}
