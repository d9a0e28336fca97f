//! Session orchestration: set up, run, and collect one measurement session.
//!
//! A session applies its cache-partition configuration (when every workload
//! requests one), starts one [`WorkloadRunner`] task per workload around a
//! shared [`CoExecutionCoordinator`], waits for all of them, and returns
//! either every workload's co-located runtimes or the first error.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

use super::coordinator::CoExecutionCoordinator;
use super::launcher::WorkloadLauncher;
use super::runner::{RunnerReport, WorkloadRunner};
use crate::cache::{CacheAllocator, CacheAssignment};
use crate::models::session::SessionSpec;
use crate::{AppError, Result};

/// Results of a successful session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    /// Session label.
    pub label: String,
    /// Per-runner reports, in workload order.
    pub reports: Vec<RunnerReport>,
    /// Final value of the completion counter.
    pub completed: usize,
}

impl SessionOutcome {
    /// Co-located runtimes of every workload, in workload order.
    #[must_use]
    pub fn samples(&self) -> Vec<Vec<Duration>> {
        self.reports.iter().map(|r| r.samples.clone()).collect()
    }
}

/// Runs sessions against a launcher and an optional cache allocator.
#[derive(Clone)]
pub struct SessionOrchestrator {
    launcher: Arc<dyn WorkloadLauncher>,
    allocator: Option<Arc<dyn CacheAllocator>>,
}

impl SessionOrchestrator {
    /// Construct an orchestrator without cache partitioning support.
    #[must_use]
    pub fn new(launcher: Arc<dyn WorkloadLauncher>) -> Self {
        Self {
            launcher,
            allocator: None,
        }
    }

    /// Attach the allocator used when a session requests cache partitioning.
    #[must_use]
    pub fn with_cache_allocator(mut self, allocator: Arc<dyn CacheAllocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Run `session` to completion.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CacheAllocation` if partitioning was requested
    /// but could not be applied (no workload is started in that case), or
    /// the first `AppError::Execution` raised by any runner, including a
    /// runner task that panicked. Partial results of other runners are
    /// discarded.
    pub async fn run_session(&self, session: &SessionSpec) -> Result<SessionOutcome> {
        let span = info_span!("session", label = session.label());
        self.run_inner(session).instrument(span).await
    }

    async fn run_inner(&self, session: &SessionSpec) -> Result<SessionOutcome> {
        if session.wants_cache_partitioning() {
            self.apply_cache_partitions(session).await?;
        }

        let total = session.workloads().len();
        let coordinator = Arc::new(CoExecutionCoordinator::new(total));
        info!(
            workloads = total,
            min_iterations = session.min_iterations(),
            tolerance = session.tolerance(),
            "session starting"
        );

        let watched: Vec<_> = session
            .workloads()
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let runner = WorkloadRunner::new(index, spec.clone(), session);
                let launcher = Arc::clone(&self.launcher);
                let handle = tokio::spawn(
                    runner
                        .run(launcher, Arc::clone(&coordinator))
                        .instrument(info_span!("runner", workload = index)),
                );
                watch_runner(index, spec.command.clone(), handle, Arc::clone(&coordinator))
            })
            .collect();

        let joined = join_all(watched).await;

        if let Some(err) = coordinator.take_error().await {
            return Err(err);
        }

        let mut reports = Vec::with_capacity(total);
        for result in joined {
            reports.push(result?);
        }

        let completed = coordinator.completed().await;
        info!(completed, "session finished");

        Ok(SessionOutcome {
            label: session.label().to_owned(),
            reports,
            completed,
        })
    }

    async fn apply_cache_partitions(&self, session: &SessionSpec) -> Result<()> {
        let allocator = self.allocator.clone().ok_or_else(|| {
            AppError::CacheAllocation("cache partitioning requested but no allocator configured".into())
        })?;
        let assignments: Vec<CacheAssignment> = session
            .workloads()
            .iter()
            .map(|w| CacheAssignment {
                cpus: w.cpu_set.clone(),
                mask: w.cache_mask,
            })
            .collect();

        tokio::task::spawn_blocking(move || allocator.apply(&assignments))
            .await
            .map_err(|err| AppError::CacheAllocation(format!("allocator task panicked: {err}")))?
    }
}

/// Await a runner task, turning a panic into a published session error.
///
/// The failure is published so the partner stops at its next check.
async fn watch_runner(
    index: usize,
    command: String,
    handle: JoinHandle<Result<RunnerReport>>,
    coordinator: Arc<CoExecutionCoordinator>,
) -> Result<RunnerReport> {
    match handle.await {
        Ok(result) => result,
        Err(err) => {
            error!(workload = index, %err, "runner task failed");
            let failure = AppError::Execution {
                workload: index,
                command,
                reason: format!("runner task failed: {err}"),
            };
            coordinator.publish_error(failure.clone()).await;
            Err(failure)
        }
    }
}
