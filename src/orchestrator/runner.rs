//! Drives one workload through repeated executions.
//!
//! Each iteration runs the workload once, then takes the shared completion
//! counter to classify the sample (co-located or solo-tail) and, once the
//! minimum iteration count is reached, to check the runner's own
//! convergence. A converged runner keeps executing so its partner is still
//! measured under contention; it only stops once every runner converged.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::convergence::ConvergenceDetector;
use super::coordinator::CoExecutionCoordinator;
use super::launcher::{LaunchRequest, WorkloadLauncher};
use crate::models::session::{SessionSpec, WorkloadSpec};
use crate::Result;

/// Why a runner stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerExit {
    /// Every workload in the session converged.
    SessionComplete,
    /// A partner failed; this runner stopped at its next check.
    Aborted,
}

/// What a runner hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerReport {
    /// Ordinal index of the workload.
    pub workload: usize,
    /// Co-located runtimes, in iteration order.
    pub samples: Vec<Duration>,
    /// Total number of executed iterations.
    pub iterations: u32,
    /// Iteration at which the runner converged, if it did.
    pub converged_at: Option<u32>,
    /// Reason the runner stopped.
    pub exit: RunnerExit,
}

/// Per-workload runner state. Owned by exactly one task.
#[derive(Debug)]
pub struct WorkloadRunner {
    request: LaunchRequest,
    min_iterations: u32,
    detector: ConvergenceDetector,
    samples: Vec<Duration>,
    series: Vec<f64>,
    converged_at: Option<u32>,
}

impl WorkloadRunner {
    /// Construct the runner for workload `index` of `session`.
    #[must_use]
    pub fn new(index: usize, spec: WorkloadSpec, session: &SessionSpec) -> Self {
        Self {
            request: LaunchRequest {
                session: session.label().to_owned(),
                workload: index,
                spec,
                iteration: 0,
                timeout: session.iteration_timeout(),
            },
            min_iterations: session.min_iterations(),
            detector: ConvergenceDetector::new(session.tolerance()),
            samples: Vec::new(),
            series: Vec::new(),
            converged_at: None,
        }
    }

    /// Iterate until the session completes or fails.
    ///
    /// # Errors
    ///
    /// Returns the execution error of this runner's own workload after
    /// publishing it to the coordinator. A partner's failure is not an error
    /// here; the runner returns a report with [`RunnerExit::Aborted`].
    pub async fn run(
        mut self,
        launcher: Arc<dyn WorkloadLauncher>,
        coordinator: Arc<CoExecutionCoordinator>,
    ) -> Result<RunnerReport> {
        let workload = self.request.workload;
        loop {
            self.request.iteration += 1;
            let iteration = self.request.iteration;

            let elapsed = match launcher.launch(&self.request).await {
                Ok(elapsed) => elapsed,
                Err(err) => {
                    warn!(workload, iteration, %err, "workload execution failed");
                    coordinator.publish_error(err.clone()).await;
                    return Err(err);
                }
            };

            if coordinator.is_aborted() {
                info!(workload, iteration, "partner failed, stopping");
                return Ok(self.finish(RunnerExit::Aborted));
            }

            let mut counter = coordinator.acquire().await;
            let class = counter.classify();
            if class.is_reported() {
                self.samples.push(elapsed);
            }
            self.series.push(elapsed.as_secs_f64());
            debug!(
                workload,
                iteration,
                elapsed_ms = elapsed.as_millis(),
                ?class,
                counter = counter.value(),
                "iteration classified"
            );

            if self.converged_at.is_none() && iteration >= self.min_iterations {
                let evaluation = self.detector.observe(&self.series);
                debug!(
                    workload,
                    iteration,
                    variance = evaluation.variance,
                    "convergence evaluated"
                );
                if evaluation.converged {
                    let value = counter.mark_completed();
                    self.converged_at = Some(iteration);
                    info!(
                        workload,
                        iteration,
                        variance = evaluation.variance,
                        counter = value,
                        "workload converged"
                    );
                }
            }

            let done = counter.all_done();
            drop(counter);

            if done {
                info!(
                    workload,
                    iterations = iteration,
                    reported = self.samples.len(),
                    "session complete, runner stopping"
                );
                return Ok(self.finish(RunnerExit::SessionComplete));
            }
        }
    }

    fn finish(self, exit: RunnerExit) -> RunnerReport {
        RunnerReport {
            workload: self.request.workload,
            samples: self.samples,
            iterations: self.request.iteration,
            converged_at: self.converged_at,
            exit,
        }
    }
}
