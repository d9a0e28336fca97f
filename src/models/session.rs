//! Measurement session model.

use std::time::Duration;

use crate::{AppError, Result};

/// Maximum number of workloads that can share one session.
pub const MAX_WORKLOADS: usize = 2;

/// One workload taking part in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    /// Human-readable workload name used in logs and reports.
    pub name: String,
    /// Opaque command string handed to the launcher.
    pub command: String,
    /// CPU set the workload is pinned to (e.g. `0-3` or `4,5`).
    pub cpu_set: String,
    /// Cache-allocation bitmask; 0 means no partitioning requested.
    pub cache_mask: u64,
}

impl WorkloadSpec {
    /// Construct a workload without a cache-partition request.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>, cpu_set: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            cpu_set: cpu_set.into(),
            cache_mask: 0,
        }
    }

    /// Attach a cache-allocation bitmask.
    #[must_use]
    pub fn with_cache_mask(mut self, mask: u64) -> Self {
        self.cache_mask = mask;
        self
    }
}

/// Immutable description of a single (solo or pairwise) measurement session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSpec {
    label: String,
    workloads: Vec<WorkloadSpec>,
    min_iterations: u32,
    tolerance: f64,
    iteration_timeout: Option<Duration>,
}

impl SessionSpec {
    /// Build a session from one or two workloads.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the workload count is not 1 or 2,
    /// `min_iterations` is zero, or `tolerance` is negative or not finite.
    pub fn new(
        label: impl Into<String>,
        workloads: Vec<WorkloadSpec>,
        min_iterations: u32,
        tolerance: f64,
    ) -> Result<Self> {
        if workloads.is_empty() || workloads.len() > MAX_WORKLOADS {
            return Err(AppError::Config(format!(
                "a session needs 1 to {MAX_WORKLOADS} workloads, got {}",
                workloads.len()
            )));
        }
        if min_iterations == 0 {
            return Err(AppError::Config(
                "min_iterations must be greater than zero".into(),
            ));
        }
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(AppError::Config(format!(
                "variance tolerance must be a non-negative number, got {tolerance}"
            )));
        }
        Ok(Self {
            label: label.into(),
            workloads,
            min_iterations,
            tolerance,
            iteration_timeout: None,
        })
    }

    /// Bound every single workload execution by `timeout`.
    #[must_use]
    pub fn with_iteration_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.iteration_timeout = timeout;
        self
    }

    /// Label used for log and measurement file names.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Workloads in session order.
    #[must_use]
    pub fn workloads(&self) -> &[WorkloadSpec] {
        &self.workloads
    }

    /// Number of iterations each runner executes before convergence is checked.
    #[must_use]
    pub fn min_iterations(&self) -> u32 {
        self.min_iterations
    }

    /// Maximum accepted change in variance between two evaluations.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Optional bound on a single workload execution.
    #[must_use]
    pub fn iteration_timeout(&self) -> Option<Duration> {
        self.iteration_timeout
    }

    /// Whether every workload carries a non-zero cache mask.
    #[must_use]
    pub fn wants_cache_partitioning(&self) -> bool {
        self.workloads.iter().all(|w| w.cache_mask != 0)
    }

    /// Partner of workload `index`, if this is a pairwise session.
    #[must_use]
    pub fn partner_of(&self, index: usize) -> Option<&WorkloadSpec> {
        if self.workloads.len() < 2 {
            return None;
        }
        self.workloads.get((index + 1) % self.workloads.len())
    }
}
