//! Binary availability and build ordering over a resolved toolchain graph

use anyhow::Result;
use rivet_lib::binary::{BinaryStatus, ensure_no_missing};
use rivet_lib::graph::DependencyGraph;
use rivet_lib::observer::ResolutionEvent;
use rivet_lib::primitives::Context;
use rivet_tests::TestEnvironment;

fn status(graph: &DependencyGraph, name: &str, context: Context) -> Option<BinaryStatus> {
    graph[graph.find(name, context)[0]].binary_status
}

fn resolved() -> Result<(TestEnvironment, DependencyGraph)> {
    let env = TestEnvironment::from_fixture("toolchain")?;
    let graph = env.resolve(&["app/1.0"])?;
    Ok((env, graph))
}

#[test]
fn test_default_policy_reuses_and_downloads() -> Result<()> {
    let (env, mut graph) = resolved()?;
    env.analyze(&mut graph, &[])?;

    assert_eq!(status(&graph, "cmake", Context::Build), Some(BinaryStatus::Cache));
    assert_eq!(status(&graph, "zlib", Context::Host), Some(BinaryStatus::Download));
    assert_eq!(status(&graph, "openssl", Context::Host), Some(BinaryStatus::Missing));
    assert_eq!(status(&graph, "app", Context::Host), Some(BinaryStatus::Missing));

    let zlib = graph.find("zlib", Context::Host)[0];
    assert_eq!(graph[zlib].binary_remote.as_deref(), Some("center"));
    Ok(())
}

#[test]
fn test_never_policy_leaves_missing_for_caller() -> Result<()> {
    let (env, mut graph) = resolved()?;
    env.analyze(&mut graph, &["never"])?;

    let error = ensure_no_missing(&graph).expect_err("openssl and app have no binary");
    assert_eq!(error.missing.len(), 2);
    assert!(error.missing[0].starts_with("app/1.0#a10:"));
    assert!(error.missing[1].starts_with("openssl/3.1#o31:"));
    Ok(())
}

#[test]
fn test_missing_policy_builds_what_is_absent() -> Result<()> {
    let (env, mut graph) = resolved()?;
    env.analyze(&mut graph, &["missing"])?;

    assert_eq!(status(&graph, "zlib", Context::Host), Some(BinaryStatus::Download));
    assert_eq!(status(&graph, "openssl", Context::Host), Some(BinaryStatus::Build));
    assert_eq!(status(&graph, "app", Context::Host), Some(BinaryStatus::Build));
    assert!(ensure_no_missing(&graph).is_ok());

    let classified = env
        .recorder
        .events()
        .into_iter()
        .filter(|e| matches!(e, ResolutionEvent::BinaryClassified { .. }))
        .count();
    assert_eq!(classified, graph.node_count() - 1);
    Ok(())
}

#[test]
fn test_forced_build_cascades_to_consumers() -> Result<()> {
    let (env, mut graph) = resolved()?;
    env.analyze(&mut graph, &["!cmake/*", "zlib/*", "cascade"])?;

    assert_eq!(status(&graph, "zlib", Context::Host), Some(BinaryStatus::Build));
    assert_eq!(status(&graph, "openssl", Context::Host), Some(BinaryStatus::Build));
    assert_eq!(status(&graph, "app", Context::Host), Some(BinaryStatus::Build));
    assert_eq!(status(&graph, "cmake", Context::Build), Some(BinaryStatus::Cache));
    Ok(())
}

#[test]
fn test_build_order_levels() -> Result<()> {
    let (_env, graph) = resolved()?;
    assert_eq!(
        graph.build_order_references()?,
        vec![
            vec!["cmake/3.27#c327 (build)", "zlib/1.3#z13 (host)"],
            vec!["openssl/3.1#o31 (host)"],
            vec!["app/1.0#a10 (host)"],
        ]
    );
    Ok(())
}

#[test]
fn test_independent_resolutions_classify_identically() -> Result<()> {
    let classify = || -> Result<DependencyGraph> {
        let (env, mut graph) = resolved()?;
        env.analyze(&mut graph, &["missing", "cascade"])?;
        Ok(graph)
    };
    let first = classify()?;
    let second = classify()?;

    assert_eq!(first.node_count(), second.node_count());
    for node in first.nodes().filter(|n| n.reference.is_some()) {
        let name = node.name().unwrap_or_default();
        let twins = second.find(name, node.context);
        assert_eq!(twins.len(), 1, "{} ({})", name, node.context);
        let twin = &second[twins[0]];
        assert_eq!(node.package_id, twin.package_id, "{}", name);
        assert_eq!(node.binary_status, twin.binary_status, "{}", name);
        assert_eq!(node.binary_remote, twin.binary_remote, "{}", name);
        assert!(node.binary_status.is_some());
    }
    assert_eq!(status(&first, "app", Context::Host), Some(BinaryStatus::Build));
    Ok(())
}
