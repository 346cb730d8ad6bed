//! Driving resolution, locking, and execution from a loaded `rivet.toml`

use anyhow::Result;
use rivet_lib::RivetConfig;
use rivet_lib::binary::BinaryAnalyzer;
use rivet_lib::graph::GraphError;
use rivet_lib::lockfile::Lockfile;
use rivet_lib::orchestration::BuildTask;
use rivet_lib::resolver::ResolveError;
use rivet_tests::TestEnvironment;

const PROJECT_CONFIG: &str = r#"
lockfile_strict = true
lockfile_clean = true
jobs = 2
build_policy = ["missing"]
"#;

fn configured() -> Result<(TestEnvironment, RivetConfig)> {
    let env = TestEnvironment::from_fixture("toolchain")?;
    std::fs::write(env.path("rivet.toml"), PROJECT_CONFIG)?;
    let config = RivetConfig::load_from(env.dir(), std::iter::empty())?;
    Ok((env, config))
}

#[test]
fn test_config_drives_strict_and_clean_locking() -> Result<()> {
    let (env, config) = configured()?;
    assert!(config.lockfile_strict);
    assert!(config.lockfile_clean);

    let mut lockfile = Lockfile::new();
    config.update_lockfile(&mut lockfile, &env.resolve(&["app/1.0"])?);
    assert_eq!(lockfile.len(), 4);

    let relocked = env.resolve_with(&["app/1.0"], Some(config.locked_resolution(&lockfile)))?;
    assert_eq!(relocked.node_count(), 5);

    let unlocked = env.resolve_with(&["bzip2/1.0"], Some(config.locked_resolution(&lockfile)));
    assert!(matches!(
        unlocked,
        Err(GraphError::Resolve(ResolveError::LockfileConflict { .. }))
    ));

    config.update_lockfile(&mut lockfile, &env.resolve(&["zlib/1.3"])?);
    assert_eq!(lockfile.len(), 1);
    assert_eq!(lockfile.entries()[0].reference.name, "zlib");
    Ok(())
}

#[tokio::test]
async fn test_config_sizes_the_executor() -> Result<()> {
    let (env, config) = configured()?;
    let mut graph = env.resolve(&["app/1.0"])?;
    BinaryAnalyzer::new(&env.sources, &env.recorder).analyze(&mut graph, &config.build_policy()?);

    let executor = config.build_executor()?;
    assert_eq!(executor.jobs(), 2);
    let report = executor
        .run(&graph, |_task: BuildTask| std::future::ready(Ok::<(), String>(())))
        .await?;
    assert_eq!(report.completed.len(), 3);
    assert_eq!(report.skipped, 1);
    Ok(())
}
