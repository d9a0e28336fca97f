//! Solo-run baselines persisted as JSON.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::stats::RuntimeStats;
use crate::{AppError, Result};

/// File name of the reference table inside the output directory.
pub const REFERENCE_FILE: &str = "references.json";

/// Solo baseline of one workload command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ReferenceEntry {
    /// Statistics of the solo run.
    pub stats: RuntimeStats,
    /// CPU set the solo run was pinned to.
    pub cpu_set: String,
    /// When the baseline was measured.
    pub measured_at: DateTime<Utc>,
}

/// Solo baselines keyed by workload command.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReferenceTable {
    entries: BTreeMap<String, ReferenceEntry>,
}

impl ReferenceTable {
    /// Load the table from `path`; a missing file yields an empty table.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Report` if the file exists but cannot be read or
    /// parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(AppError::Report(format!(
                "failed to read {}: {err}",
                path.display()
            ))),
        }
    }

    /// Persist the table to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Report` if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .map_err(|err| AppError::Report(format!("failed to write {}: {err}", path.display())))?;
        info!(path = %path.display(), entries = self.entries.len(), "reference table saved");
        Ok(())
    }

    /// Record the solo baseline of `command`, replacing any previous one.
    pub fn insert(&mut self, command: impl Into<String>, stats: RuntimeStats, cpu_set: impl Into<String>) {
        self.entries.insert(
            command.into(),
            ReferenceEntry {
                stats,
                cpu_set: cpu_set.into(),
                measured_at: Utc::now(),
            },
        );
    }

    /// Baseline of `command`, if measured.
    #[must_use]
    pub fn get(&self, command: &str) -> Option<&ReferenceEntry> {
        self.entries.get(command)
    }

    /// Co-slowdown of `stats` against the baseline of `command`.
    #[must_use]
    pub fn co_slowdown(&self, command: &str, stats: &RuntimeStats) -> Option<f64> {
        self.get(command)
            .and_then(|entry| stats.co_slowdown(&entry.stats))
    }

    /// Whether no baseline is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
