//! Executing a classified graph on the bounded worker pool

use anyhow::Result;
use rivet_lib::binary::BinaryStatus;
use rivet_lib::orchestration::{BuildExecutor, BuildTask, OrchestrationError};
use rivet_tests::TestEnvironment;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_executor_materializes_in_build_order() -> Result<()> {
    let env = TestEnvironment::from_fixture("toolchain")?;
    let mut graph = env.resolve(&["app/1.0"])?;
    env.analyze(&mut graph, &["missing"])?;

    let seen: Arc<Mutex<Vec<(usize, String, Option<BinaryStatus>)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let report = BuildExecutor::new(2)?
        .run(&graph, move |task: BuildTask| {
            if let Ok(mut seen) = sink.lock() {
                seen.push((task.level, task.reference.name.clone(), task.status));
            }
            std::future::ready(Ok::<(), String>(()))
        })
        .await?;

    let mut seen = seen.lock().map_err(|e| anyhow::anyhow!("{}", e))?.clone();
    seen.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
    assert_eq!(
        seen,
        vec![
            (0, "zlib".to_string(), Some(BinaryStatus::Download)),
            (1, "openssl".to_string(), Some(BinaryStatus::Build)),
            (2, "app".to_string(), Some(BinaryStatus::Build)),
        ]
    );
    assert_eq!(report.skipped, 1);
    assert_eq!(report.levels, 3);
    Ok(())
}

#[tokio::test]
async fn test_executor_refuses_graph_with_missing_binaries() -> Result<()> {
    let env = TestEnvironment::from_fixture("toolchain")?;
    let mut graph = env.resolve(&["app/1.0"])?;
    env.analyze(&mut graph, &["never"])?;

    let result = BuildExecutor::new(1)?
        .run(&graph, |_task: BuildTask| std::future::ready(Ok::<(), String>(())))
        .await;
    assert!(matches!(result, Err(OrchestrationError::MissingBinaries(_))));
    Ok(())
}
