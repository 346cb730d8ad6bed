//! Bounded execution of build-order levels
//!
//! [`BuildExecutor`] hands the nodes of a classified graph to a caller
//! supplied task function, one build-order level at a time. Tasks inside a
//! level run concurrently, limited by a semaphore; a level only starts once
//! every task of the previous level succeeded.

use crate::binary::{BinaryStatus, MissingBinariesError, ensure_no_missing};
use crate::graph::{DependencyGraph, GraphError, NodeId};
use crate::package_id::PackageId;
use crate::primitives::{Context, PackageReference};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{Instrument, Span, debug, info_span, trace};
use tracing_indicatif::span_ext::IndicatifSpanExt;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Invalid job count: {count} (must be > 0)")]
    InvalidJobCount { count: u32 },

    #[error("Cannot order graph for execution: {source}")]
    BuildOrder {
        #[from]
        source: GraphError,
    },

    #[error(transparent)]
    MissingBinaries(#[from] MissingBinariesError),

    #[error("Task for {task} failed: {reason}")]
    TaskFailed { task: String, reason: String },

    #[error("Task join error: {source}")]
    TaskJoinError {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error("Semaphore acquire error: {source}")]
    SemaphoreError {
        #[from]
        source: tokio::sync::AcquireError,
    },
}

/// One node handed to the task function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTask {
    pub node: NodeId,
    pub reference: PackageReference,
    pub context: Context,
    pub package_id: Option<PackageId>,
    /// `None` when the graph was never classified
    pub status: Option<BinaryStatus>,
    /// Zero-based build-order level
    pub level: usize,
}

impl fmt::Display for BuildTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reference, self.context)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Tasks in completion-independent order: level by level, sorted within
    pub completed: Vec<String>,
    /// Nodes already in the cache
    pub skipped: usize,
    pub levels: usize,
}

/// Runs build-order levels on a bounded worker pool
#[derive(Debug, Clone)]
pub struct BuildExecutor {
    semaphore: Arc<Semaphore>,
    jobs: u32,
}

impl BuildExecutor {
    pub fn new(jobs: u32) -> Result<Self, OrchestrationError> {
        if jobs == 0 {
            return Err(OrchestrationError::InvalidJobCount { count: jobs });
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(jobs as usize)),
            jobs,
        })
    }

    /// Executor sized to the available parallelism
    pub fn with_default_jobs() -> Result<Self, OrchestrationError> {
        let jobs = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        Self::new(jobs)
    }

    pub fn jobs(&self) -> u32 {
        self.jobs
    }

    /// Materialize every node of `graph` that needs work.
    ///
    /// Nodes classified `Cache` are skipped; a `Missing` node fails the run
    /// before any task starts.
    pub async fn run<F, Fut, E>(
        &self,
        graph: &DependencyGraph,
        task_fn: F,
    ) -> Result<ExecutionReport, OrchestrationError>
    where
        F: Fn(BuildTask) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        ensure_no_missing(graph)?;
        let levels = graph.build_order()?;
        let task_fn = Arc::new(task_fn);
        let mut report = ExecutionReport {
            levels: levels.len(),
            ..ExecutionReport::default()
        };

        debug!(levels = levels.len(), jobs = self.jobs, "Starting build execution");
        for (index, level) in levels.into_iter().enumerate() {
            let (pending, cached): (Vec<BuildTask>, Vec<BuildTask>) = level
                .into_iter()
                .filter_map(|id| task_for(graph, id, index))
                .partition(|t| t.status != Some(BinaryStatus::Cache));
            report.skipped += cached.len();
            if pending.is_empty() {
                continue;
            }

            let span = info_span!("build_level", level = index, tasks = pending.len());
            span.pb_set_length(pending.len() as u64);
            let completed = self
                .run_level(pending, task_fn.clone())
                .instrument(span)
                .await?;
            report.completed.extend(completed);
        }

        debug!(
            completed = report.completed.len(),
            skipped = report.skipped,
            "Build execution finished"
        );
        Ok(report)
    }

    /// Run one level; waits for every task before reporting the first failure
    async fn run_level<F, Fut, E>(
        &self,
        tasks: Vec<BuildTask>,
        task_fn: Arc<F>,
    ) -> Result<Vec<String>, OrchestrationError>
    where
        F: Fn(BuildTask) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let semaphore = self.semaphore.clone();
            let task_fn = task_fn.clone();
            let label = task.to_string();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire().await?;
                trace!(task = %task, "Running build task");
                Ok::<_, OrchestrationError>(task_fn(task).await.map_err(|e| e.to_string()))
            });
            handles.push((label, handle));
        }

        let mut completed = Vec::new();
        let mut failure = None;
        for (label, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(reason))) => Err(OrchestrationError::TaskFailed {
                    task: label.clone(),
                    reason,
                }),
                Ok(Err(error)) => Err(error),
                Err(error) => Err(OrchestrationError::from(error)),
            };
            Span::current().pb_inc(1);
            match outcome {
                Ok(()) => completed.push(label),
                Err(error) => {
                    if failure.is_none() {
                        failure = Some(error);
                    }
                }
            }
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(completed),
        }
    }
}

fn task_for(graph: &DependencyGraph, id: NodeId, level: usize) -> Option<BuildTask> {
    let node = &graph[id];
    Some(BuildTask {
        node: id,
        reference: node.reference.clone()?,
        context: node.context,
        package_id: node.package_id.clone(),
        status: node.binary_status,
        level,
    })
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
