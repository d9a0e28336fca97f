//! Workload launch mode: how a workload is bound to its CPU set.
//!
//! `LaunchMode` is accepted both from the TOML config (`launch_mode`) and as
//! the `--launch-mode` CLI override.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How the launcher pins a workload to its CPU set.
///
/// Defaults to [`LaunchMode::Native`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Plain `/bin/sh` process; affinity passed through `GOMP_CPU_AFFINITY`.
    #[default]
    Native,
    /// Unikernel guest started under `numactl --physcpubind`.
    Unikernel,
}
