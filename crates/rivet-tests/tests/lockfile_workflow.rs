//! Lock, persist, and re-resolve against a lockfile

use anyhow::Result;
use rivet_lib::graph::GraphError;
use rivet_lib::lockfile::{LockedResolution, Lockfile};
use rivet_lib::observer::ResolutionEvent;
use rivet_lib::primitives::Context;
use rivet_lib::resolver::ResolveError;
use rivet_tests::TestEnvironment;

fn zlib_of(graph: &rivet_lib::DependencyGraph) -> String {
    graph[graph.find("zlib", Context::Host)[0]].display_name()
}

#[test]
fn test_strict_lockfile_pins_previous_resolution() -> Result<()> {
    let env = TestEnvironment::from_fixture("toolchain")?;
    let graph = env.resolve(&["app/1.0"])?;

    let mut lockfile = Lockfile::new();
    lockfile.update(&graph, false);
    let path = env.path("rivet.lock");
    lockfile.save(&path)?;

    // a newer zlib shows up after locking
    env.cache.add_revisions(&["zlib/1.4#z14%500"])?;
    assert_eq!(zlib_of(&env.resolve(&["zlib/[>=1.2 <2]"])?), "zlib/1.4#z14");

    let loaded = Lockfile::load(&path)?;
    assert_eq!(loaded, lockfile);
    let relocked = env.resolve_strict(&["app/1.0"], &loaded)?;
    assert_eq!(zlib_of(&relocked), "zlib/1.3#z13");

    let mismatches = env
        .recorder
        .events()
        .into_iter()
        .filter(|e| matches!(e, ResolutionEvent::LockedPackageIdMismatch { .. }))
        .count();
    assert_eq!(mismatches, 0);
    assert!(relocked.warnings().is_empty());
    Ok(())
}

#[test]
fn test_strict_lockfile_rejects_unlocked_packages() -> Result<()> {
    let env = TestEnvironment::from_fixture("toolchain")?;
    let mut lockfile = Lockfile::new();
    lockfile.update(&env.resolve(&["zlib/1.3"])?, false);

    let error = env
        .resolve_strict(&["bzip2/1.0"], &lockfile)
        .expect_err("bzip2 was never locked");
    assert!(matches!(
        error,
        GraphError::Resolve(ResolveError::LockfileConflict { .. })
    ));
    Ok(())
}

#[test]
fn test_lenient_lockfile_falls_back() -> Result<()> {
    let env = TestEnvironment::from_fixture("toolchain")?;
    let mut lockfile = Lockfile::new();
    lockfile.update(&env.resolve(&["zlib/1.2.13"])?, false);

    // no source holds a locked candidate, so every source is consulted
    let graph = env.resolve_with(&["zlib/[>=1.3]"], Some(LockedResolution::lenient(&lockfile)))?;
    assert_eq!(zlib_of(&graph), "zlib/1.3#z13new");
    assert!(
        env.recorder
            .events()
            .iter()
            .any(|e| matches!(e, ResolutionEvent::LockfileFallback { .. }))
    );
    Ok(())
}

#[test]
fn test_lockfile_is_byte_stable_across_cycles() -> Result<()> {
    let env = TestEnvironment::from_fixture("toolchain")?;
    let path = env.path("rivet.lock");

    let mut lockfile = Lockfile::new();
    lockfile.update(&env.resolve(&["app/1.0"])?, false);
    lockfile.save(&path)?;
    let first = std::fs::read_to_string(&path)?;

    for _ in 0..2 {
        let loaded = Lockfile::load(&path)?;
        let mut next = loaded.clone();
        next.update(&env.resolve_strict(&["app/1.0"], &loaded)?, false);
        next.save(&path)?;
    }
    assert_eq!(std::fs::read_to_string(&path)?, first);

    let document: serde_json::Value = serde_json::from_str(&first)?;
    assert_eq!(document["version"], "0.1");
    let refs: Vec<&str> = document["entries"]
        .as_array()
        .map(|entries| entries.iter().filter_map(|e| e["ref"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(
        refs,
        vec![
            "app/1.0#a10%100",
            "cmake/3.27#c327%100",
            "openssl/3.1#o31%100",
            "zlib/1.3#z13%100"
        ]
    );
    Ok(())
}

#[test]
fn test_clean_update_drops_stale_entries() -> Result<()> {
    let env = TestEnvironment::from_fixture("toolchain")?;
    let mut lockfile = Lockfile::new();
    lockfile.update(&env.resolve(&["bzip2/1.0"])?, false);
    lockfile.update(&env.resolve(&["zlib/1.3"])?, false);
    assert_eq!(lockfile.len(), 2);

    lockfile.update(&env.resolve(&["zlib/1.3"])?, true);
    assert_eq!(lockfile.len(), 1);
    assert_eq!(lockfile.entries()[0].reference.name, "zlib");
    Ok(())
}
