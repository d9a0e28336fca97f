//! Benchmark configuration parsing and validation.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::mode::LaunchMode;
use crate::models::session::{SessionSpec, WorkloadSpec};
use crate::{AppError, Result};

/// Cache-allocation (resctrl) settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Whether cache partitioning is applied before each session.
    #[serde(default)]
    pub enabled: bool,
    /// Mount point of the resctrl filesystem.
    #[serde(default = "default_resctrl_root")]
    pub resctrl_root: PathBuf,
    /// L3 cache domain the masks apply to.
    #[serde(default)]
    pub cache_id: u32,
    /// One L3 capacity bitmask per CPU set, in CPU-set order.
    #[serde(default)]
    pub masks: Vec<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            resctrl_root: default_resctrl_root(),
            cache_id: 0,
            masks: Vec::new(),
        }
    }
}

/// A workload entry from the `[[workload]]` array.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkloadConfig {
    /// Short unique name.
    pub name: String,
    /// Shell command executed once per iteration.
    pub command: String,
}

fn default_min_runs() -> u32 {
    10
}

fn default_variance_tolerance() -> f64 {
    0.0001
}

fn default_threads() -> String {
    "1".into()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_resctrl_root() -> PathBuf {
    PathBuf::from("/sys/fs/resctrl")
}

/// Global configuration parsed from `coslowdown.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct BenchConfig {
    /// Iterations every runner executes before convergence is evaluated.
    #[serde(default = "default_min_runs")]
    pub min_runs: u32,
    /// Maximum change in runtime variance (s²) accepted as converged.
    #[serde(default = "default_variance_tolerance")]
    pub variance_tolerance: f64,
    /// Thread count exported to the workloads.
    #[serde(default = "default_threads")]
    pub threads: String,
    /// How workloads are bound to their CPU set.
    #[serde(default)]
    pub launch_mode: LaunchMode,
    /// The two CPU sets workloads are pinned to; solo runs use the first.
    pub cpu_sets: Vec<String>,
    /// Directory receiving logs, measurement files, and the stats file.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Per-iteration execution bound in seconds; 0 means unbounded.
    #[serde(default)]
    pub iteration_timeout_seconds: u64,
    /// Cache partitioning settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Workloads under test.
    #[serde(rename = "workload", default)]
    pub workloads: Vec<WorkloadConfig>,
}

impl BenchConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Per-iteration timeout, or `None` when executions are unbounded.
    #[must_use]
    pub fn iteration_timeout(&self) -> Option<Duration> {
        (self.iteration_timeout_seconds > 0)
            .then(|| Duration::from_secs(self.iteration_timeout_seconds))
    }

    /// Build the session that runs workload `index` alone on the first CPU set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `index` is out of range.
    pub fn solo_session(&self, index: usize) -> Result<SessionSpec> {
        let workload = self.workload_spec(index, 0)?;
        SessionSpec::new(
            format!("solo-{}", workload.name),
            vec![workload],
            self.min_runs,
            self.variance_tolerance,
        )
        .map(|s| s.with_iteration_timeout(self.iteration_timeout()))
    }

    /// Build the session co-locating workloads `first` and `second`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if either index is out of range.
    pub fn pair_session(&self, first: usize, second: usize) -> Result<SessionSpec> {
        let a = self.workload_spec(first, 0)?;
        let b = self.workload_spec(second, 1)?;
        SessionSpec::new(
            format!("{}-{}", a.name, b.name),
            vec![a, b],
            self.min_runs,
            self.variance_tolerance,
        )
        .map(|s| s.with_iteration_timeout(self.iteration_timeout()))
    }

    /// Every unordered pair of workloads, self-pairs included.
    #[must_use]
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        let n = self.workloads.len();
        (0..n)
            .flat_map(|i| (i..n).map(move |j| (i, j)))
            .collect()
    }

    fn workload_spec(&self, index: usize, slot: usize) -> Result<WorkloadSpec> {
        let workload = self
            .workloads
            .get(index)
            .ok_or_else(|| AppError::Config(format!("no workload at index {index}")))?;
        let cpu_set = self
            .cpu_sets
            .get(slot)
            .ok_or_else(|| AppError::Config(format!("no cpu set for slot {slot}")))?;
        let mask = if self.cache.enabled {
            self.cache.masks.get(slot).copied().unwrap_or(0)
        } else {
            0
        };
        Ok(WorkloadSpec::new(&workload.name, &workload.command, cpu_set).with_cache_mask(mask))
    }

    fn validate(&self) -> Result<()> {
        if self.min_runs == 0 {
            return Err(AppError::Config(
                "min_runs must be greater than zero".into(),
            ));
        }

        if !self.variance_tolerance.is_finite() || self.variance_tolerance < 0.0 {
            return Err(AppError::Config(
                "variance_tolerance must be a non-negative number".into(),
            ));
        }

        if self.cpu_sets.len() != 2 || self.cpu_sets.iter().any(|c| c.trim().is_empty()) {
            return Err(AppError::Config(
                "cpu_sets must contain exactly two non-empty entries".into(),
            ));
        }

        if self.workloads.is_empty() {
            return Err(AppError::Config(
                "at least one [[workload]] must be configured".into(),
            ));
        }

        let mut seen = HashSet::new();
        for workload in &self.workloads {
            if workload.command.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "workload {} has an empty command",
                    workload.name
                )));
            }
            if !seen.insert(workload.name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate workload name {}",
                    workload.name
                )));
            }
        }

        if self.cache.enabled
            && (self.cache.masks.len() != 2 || self.cache.masks.contains(&0))
        {
            return Err(AppError::Config(
                "cache.masks must hold two non-zero bitmasks when cache partitioning is enabled"
                    .into(),
            ));
        }

        Ok(())
    }
}
