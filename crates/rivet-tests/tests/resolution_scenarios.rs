//! End-to-end graph resolution scenarios
//!
//! Each test resolves a fixture universe through the public API and checks
//! the shape of the resulting graph or the error explaining why none exists.

use anyhow::Result;
use rivet_lib::graph::GraphError;
use rivet_lib::observer::ResolutionEvent;
use rivet_lib::primitives::Context;
use rivet_lib::resolver::ResolveError;
use rivet_tests::TestEnvironment;

const HOST: &str = r#"
[settings]
os = "Windows"
arch = "x86_64"
build_type = "Release"

[options]
"app/*:shared" = "True"
"#;

const BUILD: &str = r#"
[settings]
os = "Linux"
arch = "x86_64"
build_type = "Release"
"#;

fn toolchain() -> Result<TestEnvironment> {
    TestEnvironment::from_fixture("toolchain")?.with_profiles(HOST, BUILD)
}

#[test]
fn test_range_and_exact_pin_conflict_names_both_requirers() -> Result<()> {
    let env = TestEnvironment::from_fixture("conflict")?;

    let error = env
        .resolve(&["liba/[>=1.0 <2.0]", "libb/1.0"])
        .expect_err("incompatible pins must not resolve");

    match &error {
        GraphError::VersionConflict {
            fixed,
            fixed_by,
            requested,
            requested_by,
            ..
        } => {
            assert_eq!(fixed, "liba/1.5#a15");
            assert_eq!(fixed_by, "<virtual root>");
            assert_eq!(requested, "liba/1.2");
            assert_eq!(requested_by, "libb/1.0#b10");
        }
        other => panic!("expected a version conflict, got {}", other),
    }
    let message = error.to_string();
    assert!(message.contains("liba"));
    assert!(message.contains("libb/1.0#b10"));
    Ok(())
}

#[test]
fn test_toolchain_graph_shape() -> Result<()> {
    let env = toolchain()?;
    let graph = env.resolve(&["app/1.0"])?;

    let app = graph.find("app", Context::Host)[0];
    let zlib = graph.find("zlib", Context::Host)[0];
    let openssl = graph.find("openssl", Context::Host)[0];
    let cmake = graph.find("cmake", Context::Build)[0];

    assert_eq!(graph[zlib].display_name(), "zlib/1.3#z13");
    assert_eq!(graph[openssl].dependencies[0].target, zlib);
    assert_eq!(graph[app].options.get("shared").map(String::as_str), Some("True"));
    assert_eq!(graph[app].settings.get("os").map(String::as_str), Some("Windows"));
    assert_eq!(graph[cmake].settings.get("os").map(String::as_str), Some("Linux"));
    assert!(graph.find("cmake", Context::Host).is_empty());
    assert!(graph.warnings().is_empty());

    let collapsed = env
        .recorder
        .events()
        .into_iter()
        .filter(|e| matches!(e, ResolutionEvent::DiamondCollapsed { .. }))
        .count();
    assert_eq!(collapsed, 1);
    Ok(())
}

#[test]
fn test_update_prefers_newer_remote_revision() -> Result<()> {
    let mut env = toolchain()?;
    let cached = env.resolve(&["zlib/[>=1.2 <2]"])?;
    assert_eq!(
        cached[cached.find("zlib", Context::Host)[0]].display_name(),
        "zlib/1.3#z13"
    );
    assert_eq!(env.remotes[0].list_calls(), 0);

    env.update = true;
    let updated = env.resolve(&["zlib/[>=1.2 <2]"])?;
    assert_eq!(
        updated[updated.find("zlib", Context::Host)[0]].display_name(),
        "zlib/1.3#z13new"
    );
    Ok(())
}

#[test]
fn test_alias_chain_collapses_to_target() -> Result<()> {
    let env = toolchain()?;
    let graph = env.resolve(&["zlib/(stable)"])?;
    let zlib = graph.find("zlib", Context::Host)[0];
    assert_eq!(graph[zlib].display_name(), "zlib/1.2.13#z12");
    Ok(())
}

#[test]
fn test_unknown_package_reports_not_found() -> Result<()> {
    let env = toolchain()?;
    let error = env.resolve(&["ghost/1.0"]).expect_err("ghost does not exist");
    assert!(matches!(
        error,
        GraphError::Resolve(ResolveError::NotFound { .. })
    ));

    let error = env
        .resolve(&["zlib/[>=2.0]"])
        .expect_err("no zlib 2.x exists");
    match error {
        GraphError::Resolve(ResolveError::RangeUnsatisfiable { available, .. }) => {
            assert_eq!(available, vec!["zlib/1.2.13", "zlib/1.3"]);
        }
        other => panic!("expected an unsatisfiable range, got {}", other),
    }
    Ok(())
}

#[test]
fn test_profile_override_forces_version_with_warning() -> Result<()> {
    let host = format!("{}\n[overrides]\nzlib = \"1.2.13\"\n", HOST);
    let env = TestEnvironment::from_fixture("toolchain")?.with_profiles(&host, BUILD)?;

    let graph = env.resolve(&["app/1.0"])?;
    let zlib = graph.find("zlib", Context::Host);
    assert_eq!(zlib.len(), 1);
    assert_eq!(graph[zlib[0]].display_name(), "zlib/1.2.13#z12");
    assert_eq!(graph.warnings().len(), 1);
    assert!(graph.warnings()[0].contains("openssl/3.1#o31 requires zlib/1.3"));
    Ok(())
}

#[test]
fn test_profile_tool_requires_cycle_and_negation() -> Result<()> {
    let injecting = "[[tool_requires]]\npattern = \"*\"\nrequires = [\"cmake/3.27\"]\n";
    let env = TestEnvironment::from_fixture("toolchain")?
        .with_profiles(HOST, &format!("{}\n{}", BUILD, injecting))?;
    let error = env.resolve(&["app/1.0"]).expect_err("cmake would require itself");
    match error {
        GraphError::Cycle { path } => {
            assert_eq!(path.first().map(String::as_str), Some("cmake/3.27#c327"));
            assert_eq!(path.last().map(String::as_str), Some("cmake/3.27"));
        }
        other => panic!("expected a cycle, got {}", other),
    }

    let excluding = "[[tool_requires]]\npattern = \"!cmake/*\"\nrequires = [\"cmake/3.27\"]\n";
    let env = TestEnvironment::from_fixture("toolchain")?
        .with_profiles(HOST, &format!("{}\n{}", BUILD, excluding))?;
    let graph = env.resolve(&["app/1.0"])?;
    assert_eq!(graph.find("cmake", Context::Build).len(), 1);
    assert!(graph.validate_acyclic().is_ok());
    Ok(())
}

#[test]
fn test_package_ids_are_reproducible() -> Result<()> {
    let first = toolchain()?.resolve(&["app/1.0"])?;
    let second = toolchain()?.resolve(&["app/1.0"])?;

    for node in first.nodes().filter(|n| n.reference.is_some()) {
        let name = node.name().unwrap_or_default();
        let twin = second.find(name, node.context)[0];
        assert_eq!(node.package_id, second[twin].package_id, "{}", name);
        assert!(node.package_id.is_some());
    }

    let host_zlib = first.find("zlib", Context::Host)[0];
    let app = first.find("app", Context::Host)[0];
    assert_ne!(first[host_zlib].package_id, first[app].package_id);
    Ok(())
}

#[test]
fn test_full_mode_tracks_dependency_revisions() -> Result<()> {
    let app_id = |update: bool, mode: &str| -> Result<Option<String>> {
        let mut env = toolchain()?;
        env.update = update;
        env.identifier = rivet_lib::PackageIdentifier::new(mode.parse()?);
        let graph = env.resolve(&["app/1.0"])?;
        let app = graph.find("app", Context::Host)[0];
        Ok(graph[app].package_id.as_ref().map(|p| p.to_string()))
    };

    assert_eq!(app_id(false, "semver")?, app_id(true, "semver")?);
    assert_ne!(app_id(false, "full")?, app_id(true, "full")?);
    Ok(())
}
