use super::*;
use crate::graph::{Dependency, GraphNode, NodeOrigin};
use crate::recipe::RequireEdge;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

// ============================================================================
// Test Utilities
// ============================================================================

/// root -> app -> {liba, libb} -> zlib
fn diamond(status: Option<BinaryStatus>) -> DependencyGraph {
    let mut graph = DependencyGraph::with_root(GraphNode::new(
        None,
        Context::Host,
        NodeOrigin::VirtualRoot,
    ));
    let add = |graph: &mut DependencyGraph, text: &str| {
        let mut node = GraphNode::new(
            Some(PackageReference::parse(text).unwrap()),
            Context::Host,
            NodeOrigin::Cache,
        );
        node.binary_status = status;
        graph.add_node(node)
    };
    let app = add(&mut graph, "app/1.0#a");
    let liba = add(&mut graph, "liba/1.0#b");
    let libb = add(&mut graph, "libb/1.0#c");
    let zlib = add(&mut graph, "zlib/1.3#d");
    let link = |graph: &mut DependencyGraph, from: NodeId, to: NodeId| {
        let text = graph[to].display_name();
        graph.node_mut(from).dependencies.push(Dependency {
            edge: RequireEdge::requires(&text).unwrap(),
            target: to,
        });
    };
    let root = graph.root();
    link(&mut graph, root, app);
    link(&mut graph, app, liba);
    link(&mut graph, app, libb);
    link(&mut graph, liba, zlib);
    link(&mut graph, libb, zlib);
    graph
}

/// root -> {pkg0 .. pkgN}, all in the first level
fn independent(count: usize) -> DependencyGraph {
    let mut graph = DependencyGraph::with_root(GraphNode::new(
        None,
        Context::Host,
        NodeOrigin::VirtualRoot,
    ));
    let root = graph.root();
    for index in 0..count {
        let text = format!("pkg{}/1.0#r", index);
        let id = graph.add_node(GraphNode::new(
            Some(PackageReference::parse(&text).unwrap()),
            Context::Host,
            NodeOrigin::Cache,
        ));
        graph.node_mut(root).dependencies.push(Dependency {
            edge: RequireEdge::requires(&text).unwrap(),
            target: id,
        });
    }
    graph
}

type Log = Arc<Mutex<Vec<(usize, String)>>>;

fn recording(log: Log) -> impl Fn(BuildTask) -> std::future::Ready<Result<(), String>> + Send + Sync + 'static {
    move |task: BuildTask| {
        log.lock().unwrap().push((task.level, task.reference.name.clone()));
        std::future::ready(Ok(()))
    }
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_zero_jobs_rejected() {
    assert!(matches!(
        BuildExecutor::new(0),
        Err(OrchestrationError::InvalidJobCount { count: 0 })
    ));
    assert_eq!(BuildExecutor::new(3).unwrap().jobs(), 3);
    assert!(BuildExecutor::with_default_jobs().unwrap().jobs() > 0);
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn test_levels_run_dependencies_first() {
    let graph = diamond(Some(BinaryStatus::Build));
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let report = BuildExecutor::new(4)
        .unwrap()
        .run(&graph, recording(log.clone()))
        .await
        .unwrap();

    let mut entries = log.lock().unwrap().clone();
    entries.sort();
    assert_eq!(
        entries,
        vec![
            (0, "zlib".to_string()),
            (1, "liba".to_string()),
            (1, "libb".to_string()),
            (2, "app".to_string()),
        ]
    );
    assert_eq!(report.levels, 3);
    assert_eq!(
        report.completed,
        vec![
            "zlib/1.3#d (host)",
            "liba/1.0#b (host)",
            "libb/1.0#c (host)",
            "app/1.0#a (host)"
        ]
    );
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let graph = independent(6);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let (r, p) = (running.clone(), peak.clone());
    let report = BuildExecutor::new(2)
        .unwrap()
        .run(&graph, move |_task| {
            let (running, peak) = (r.clone(), p.clone());
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), String>(())
            }
        })
        .await
        .unwrap();

    assert_eq!(report.completed.len(), 6);
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_failed_level_stops_dependents() {
    let graph = diamond(Some(BinaryStatus::Build));
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let inner = log.clone();
    let result = BuildExecutor::new(2)
        .unwrap()
        .run(&graph, move |task: BuildTask| {
            inner.lock().unwrap().push((task.level, task.reference.name.clone()));
            let outcome = if task.reference.name == "liba" {
                Err("compiler exited with status 1".to_string())
            } else {
                Ok(())
            };
            std::future::ready(outcome)
        })
        .await;

    match result {
        Err(OrchestrationError::TaskFailed { task, reason }) => {
            assert_eq!(task, "liba/1.0#b (host)");
            assert_eq!(reason, "compiler exited with status 1");
        }
        other => panic!("expected task failure, got {:?}", other),
    }
    let names: Vec<String> = log.lock().unwrap().iter().map(|(_, n)| n.clone()).collect();
    assert!(names.contains(&"libb".to_string()));
    assert!(!names.contains(&"app".to_string()));
}

#[tokio::test]
async fn test_panicking_task_waits_for_its_level() {
    let graph = independent(2);
    let finished = Arc::new(AtomicBool::new(false));

    let done = finished.clone();
    let result = BuildExecutor::new(2)
        .unwrap()
        .run(&graph, move |task: BuildTask| {
            let done = done.clone();
            async move {
                if task.reference.name == "pkg0" {
                    panic!("toolchain crashed");
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                done.store(true, Ordering::SeqCst);
                Ok::<(), String>(())
            }
        })
        .await;

    assert!(matches!(result, Err(OrchestrationError::TaskJoinError { .. })));
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_cached_nodes_are_skipped() {
    let mut graph = diamond(Some(BinaryStatus::Cache));
    let app = graph.find("app", Context::Host)[0];
    graph.node_mut(app).binary_status = Some(BinaryStatus::Build);
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let report = BuildExecutor::new(2)
        .unwrap()
        .run(&graph, recording(log.clone()))
        .await
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec![(2, "app".to_string())]);
    assert_eq!(report.skipped, 3);
    assert_eq!(report.completed, vec!["app/1.0#a (host)"]);
}

#[tokio::test]
async fn test_missing_binaries_fail_before_any_task() {
    let mut graph = diamond(Some(BinaryStatus::Download));
    let zlib = graph.find("zlib", Context::Host)[0];
    graph.node_mut(zlib).binary_status = Some(BinaryStatus::Missing);
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let result = BuildExecutor::new(2)
        .unwrap()
        .run(&graph, recording(log.clone()))
        .await;

    assert!(matches!(result, Err(OrchestrationError::MissingBinaries(_))));
    assert!(log.lock().unwrap().is_empty());
}
