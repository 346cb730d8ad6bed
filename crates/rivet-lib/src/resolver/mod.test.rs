use super::*;
use crate::lockfile::Lockfile;
use crate::observer::{EventRecorder, NullObserver};
use crate::testing::MemorySource;
use std::sync::Arc;

// ============================================================================
// Test Utilities
// ============================================================================

fn source(name: &str, revisions: &[&str]) -> Arc<MemorySource> {
    let source = Arc::new(MemorySource::new(name));
    source.add_revisions(revisions).unwrap();
    source
}

fn expr(text: &str) -> RefExpression {
    RefExpression::parse(text).unwrap()
}

fn reference(text: &str) -> PackageReference {
    PackageReference::parse(text).unwrap()
}

// ============================================================================
// Ranges and exact references
// ============================================================================

#[test]
fn test_range_selects_highest_version() {
    let sources = SourceSet::new(source("cache", &["liba/1.2#r1%10", "liba/1.5#r2%20", "liba/2.0#r3%30"]));
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let resolved = resolver
        .resolve(&expr("liba/[>=1.0 <2.0]"), Context::Host, None)
        .unwrap();
    assert_eq!(resolved.to_string(), "liba/1.5#r2");
    assert_eq!(resolved.timestamp, Some(20));
}

#[test]
fn test_ties_break_on_newest_revision() {
    let sources = SourceSet::new(source("cache", &["liba/1.5#old%10", "liba/1.5#new%20", "liba/1.5.0#mid%15"]));
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let resolved = resolver.resolve(&expr("liba/[~1.5]"), Context::Host, None).unwrap();
    assert_eq!(resolved.revision.as_deref(), Some("new"));

    let exact = resolver.resolve(&expr("liba/1.5"), Context::Build, None).unwrap();
    assert_eq!(exact.revision.as_deref(), Some("new"));
}

#[test]
fn test_exact_revision_requires_existence() {
    let sources = SourceSet::new(source("cache", &["liba/1.2#r1%10"]));
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let found = resolver.resolve(&expr("liba/1.2#r1"), Context::Host, None).unwrap();
    assert_eq!(found, reference("liba/1.2#r1"));
    assert_eq!(found.timestamp, Some(10));

    let missing = resolver.resolve(&expr("liba/1.2#zzz"), Context::Host, None);
    assert!(matches!(missing, Err(ResolveError::NotFound { .. })));
}

#[test]
fn test_unknown_package_is_not_found() {
    let sources = SourceSet::new(source("cache", &[]));
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let result = resolver.resolve(&expr("ghost/[*]"), Context::Host, None);
    assert!(matches!(result, Err(ResolveError::NotFound { .. })));
}

#[test]
fn test_unsatisfiable_range_lists_available_versions() {
    let sources = SourceSet::new(source("cache", &["liba/1.2#r1", "liba/1.5#r2"]));
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    match resolver.resolve(&expr("liba/[>=3]"), Context::Host, None) {
        Err(ResolveError::RangeUnsatisfiable { available, .. }) => {
            assert_eq!(available, vec!["liba/1.2".to_string(), "liba/1.5".to_string()]);
        }
        other => panic!("expected unsatisfiable range, got {:?}", other),
    }
}

#[test]
fn test_user_channel_must_match() {
    let sources = SourceSet::new(source("cache", &["liba/1.0@acme/stable#r1", "liba/1.1#r2"]));
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let resolved = resolver
        .resolve(&expr("liba/[*]@acme/stable"), Context::Host, None)
        .unwrap();
    assert_eq!(resolved.to_string(), "liba/1.0@acme/stable#r1");
}

// ============================================================================
// Cache, remotes and memoisation
// ============================================================================

#[test]
fn test_cache_hit_skips_remotes() {
    let cache = source("cache", &["liba/1.0#r1"]);
    let remote = source("center", &["liba/1.9#r9"]);
    let sources = SourceSet::new(cache).with_remote(remote.clone());
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let located = resolver
        .resolve_located(&expr("liba/[>=1.0]"), Context::Host, None)
        .unwrap();
    assert_eq!(located.reference.to_string(), "liba/1.0#r1");
    assert_eq!(located.origin, NodeOrigin::Cache);
    assert_eq!(remote.list_calls(), 0);
}

#[test]
fn test_update_checks_remotes_too() {
    let cache = source("cache", &["liba/1.0#r1"]);
    let remote = source("center", &["liba/1.9#r9"]);
    let sources = SourceSet::new(cache).with_remote(remote);
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver).with_update(true);

    let located = resolver
        .resolve_located(&expr("liba/[>=1.0]"), Context::Host, None)
        .unwrap();
    assert_eq!(located.reference.to_string(), "liba/1.9#r9");
    assert_eq!(located.origin, NodeOrigin::Remote("center".to_string()));
}

#[test]
fn test_full_tie_prefers_higher_priority_source() {
    let cache = source("cache", &["liba/1.0#local%100"]);
    let first = source("first", &["liba/1.0#mirror%100"]);
    let second = source("second", &["liba/1.0#upstream%100"]);
    let sources = SourceSet::new(cache).with_remote(first).with_remote(second);
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver).with_update(true);

    let located = resolver
        .resolve_located(&expr("liba/[>=1.0]"), Context::Host, None)
        .unwrap();
    assert_eq!(located.reference.revision.as_deref(), Some("local"));
    assert_eq!(located.origin, NodeOrigin::Cache);

    let remotes_only = SourceSet::new(source("cache", &[]))
        .with_remote(source("first", &["liba/1.0#mirror"]))
        .with_remote(source("second", &["liba/1.0#upstream"]));
    let mut resolver = ReferenceResolver::new(&remotes_only, &NullObserver).with_update(true);
    let located = resolver
        .resolve_located(&expr("liba/1.0"), Context::Host, None)
        .unwrap();
    assert_eq!(located.origin, NodeOrigin::Remote("first".to_string()));
}

#[test]
fn test_remotes_consulted_in_priority_order() {
    let first = source("first", &["liba/1.0#a"]);
    let second = source("second", &["liba/1.1#b"]);
    let sources = SourceSet::new(source("cache", &[]))
        .with_remote(first)
        .with_remote(second.clone());
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let located = resolver
        .resolve_located(&expr("liba/[*]"), Context::Host, None)
        .unwrap();
    assert_eq!(located.origin, NodeOrigin::Remote("first".to_string()));
    assert_eq!(second.list_calls(), 0);
}

#[test]
fn test_failing_remote_is_marked_unavailable_once() {
    let broken = source("broken", &["liba/9.0#x"]);
    broken.set_failing(true);
    let healthy = source("healthy", &["liba/1.0#a", "libb/1.0#b"]);
    let sources = SourceSet::new(source("cache", &[]))
        .with_remote(broken.clone())
        .with_remote(healthy);
    let recorder = EventRecorder::new();
    let mut resolver = ReferenceResolver::new(&sources, &recorder);

    resolver.resolve(&expr("liba/[*]"), Context::Host, None).unwrap();
    resolver.resolve(&expr("libb/[*]"), Context::Host, None).unwrap();

    assert_eq!(broken.list_calls(), 1);
    let unavailable: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|e| matches!(e, ResolutionEvent::RemoteUnavailable { .. }))
        .collect();
    assert_eq!(unavailable.len(), 1);
}

#[test]
fn test_failing_cache_is_an_error() {
    let cache = source("cache", &["liba/1.0#a"]);
    cache.set_failing(true);
    let sources = SourceSet::new(cache);
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let result = resolver.resolve(&expr("liba/[*]"), Context::Host, None);
    assert!(matches!(result, Err(ResolveError::Cache { .. })));
}

#[test]
fn test_same_expression_is_memoised() {
    let cache = source("cache", &["liba/1.0#a"]);
    let sources = SourceSet::new(cache.clone());
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let first = resolver.resolve(&expr("liba/[*]"), Context::Host, None).unwrap();
    cache.add_revisions(&["liba/2.0#b"]).unwrap();
    let second = resolver.resolve(&expr("liba/[*]"), Context::Host, None).unwrap();

    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(cache.list_calls(), 1);
}

// ============================================================================
// Aliases
// ============================================================================

#[test]
fn test_alias_chain_collapses() {
    let cache = source("cache", &["liba/1.0#a", "liba/2.0#b"]);
    cache.add_alias("liba/(stable)", "liba/(lts)").unwrap();
    cache.add_alias("liba/(lts)", "liba/1.0").unwrap();
    let sources = SourceSet::new(cache);
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let resolved = resolver.resolve(&expr("liba/(stable)"), Context::Host, None).unwrap();
    assert_eq!(resolved.to_string(), "liba/1.0#a");
}

#[test]
fn test_alias_loop_is_detected() {
    let cache = source("cache", &["liba/1.0#a"]);
    cache.add_alias("liba/(x)", "liba/(y)").unwrap();
    cache.add_alias("liba/(y)", "liba/(x)").unwrap();
    let sources = SourceSet::new(cache);
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    match resolver.resolve(&expr("liba/(x)"), Context::Host, None) {
        Err(ResolveError::AliasCycle { chain }) => {
            assert_eq!(chain, vec!["liba/(x)", "liba/(y)", "liba/(x)"]);
        }
        other => panic!("expected alias cycle, got {:?}", other),
    }
}

#[test]
fn test_undefined_latest_alias_means_highest() {
    let sources = SourceSet::new(source("cache", &["liba/1.0#a", "liba/2.0#b"]));
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let resolved = resolver.resolve(&expr("liba/(latest)"), Context::Host, None).unwrap();
    assert_eq!(resolved.to_string(), "liba/2.0#b");

    let undefined = resolver.resolve(&expr("liba/(nightly)"), Context::Host, None);
    assert!(matches!(undefined, Err(ResolveError::NotFound { .. })));
}

// ============================================================================
// Lockfile constraints
// ============================================================================

#[test]
fn test_strict_lockfile_pins_locked_revision() {
    let sources = SourceSet::new(source("cache", &["liba/1.2#r1", "liba/1.5#r2"]));
    let mut lockfile = Lockfile::new();
    lockfile.add(LockedEntry::new(reference("liba/1.2#r1")).with_context(Context::Host));
    let locked = LockedResolution::strict(&lockfile);
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let resolved = resolver
        .resolve(&expr("liba/[>=1.0 <2.0]"), Context::Host, Some(&locked))
        .unwrap();
    assert_eq!(resolved.to_string(), "liba/1.2#r1");
}

#[test]
fn test_strict_lockfile_conflict() {
    let sources = SourceSet::new(source("cache", &["liba/1.2#r1", "liba/1.5#r2"]));
    let mut lockfile = Lockfile::new();
    lockfile.add(LockedEntry::new(reference("liba/1.2#r1")));
    let locked = LockedResolution::strict(&lockfile);
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let result = resolver.resolve(&expr("liba/[>=1.5]"), Context::Host, Some(&locked));
    match result {
        Err(ResolveError::LockfileConflict { locked, .. }) => {
            assert_eq!(locked, vec!["liba/1.2#r1".to_string()]);
        }
        other => panic!("expected lockfile conflict, got {:?}", other),
    }

    let unlisted = resolver.resolve(&expr("libz/[*]"), Context::Host, Some(&locked));
    assert!(unlisted.is_err());
}

#[test]
fn test_lenient_lockfile_falls_back() {
    let sources = SourceSet::new(source("cache", &["liba/1.2#r1", "liba/1.5#r2"]));
    let mut lockfile = Lockfile::new();
    lockfile.add(LockedEntry::new(reference("liba/1.2#r1")));
    let locked = LockedResolution::lenient(&lockfile);
    let recorder = EventRecorder::new();
    let mut resolver = ReferenceResolver::new(&sources, &recorder);

    let preferred = resolver
        .resolve(&expr("liba/[>=1.0]"), Context::Host, Some(&locked))
        .unwrap();
    assert_eq!(preferred.to_string(), "liba/1.2#r1");

    let fallback = resolver
        .resolve(&expr("liba/[>=1.5]"), Context::Host, Some(&locked))
        .unwrap();
    assert_eq!(fallback.to_string(), "liba/1.5#r2");
    assert!(recorder
        .events()
        .iter()
        .any(|e| matches!(e, ResolutionEvent::LockfileFallback { .. })));
}

#[test]
fn test_locked_entry_order_breaks_ties() {
    let sources = SourceSet::new(source("cache", &["liba/1.2#r1", "liba/1.5#r2"]));
    let mut lockfile = Lockfile::new();
    lockfile.add(LockedEntry::new(reference("liba/1.2#r1")));
    lockfile.add(LockedEntry::new(reference("liba/1.5#r2")));
    let locked = LockedResolution::strict(&lockfile);
    let mut resolver = ReferenceResolver::new(&sources, &NullObserver);

    let resolved = resolver
        .resolve(&expr("liba/[*]"), Context::Host, Some(&locked))
        .unwrap();
    assert_eq!(resolved.to_string(), "liba/1.2#r1");
}
