//! Statistics reporting and persistence for finished sessions.
//!
//! [`ReferenceTable`] keeps the solo baselines used to compute co-slowdown;
//! [`ReportWriter`] appends rows to the `stats` file and writes one
//! measurement file per workload.

pub mod reference;
pub mod writer;

pub use reference::{ReferenceEntry, ReferenceTable};
pub use writer::ReportWriter;

use crate::stats::RuntimeStats;

/// Statistics of one workload within one session, ready for output.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadSummary {
    /// Workload command.
    pub command: String,
    /// Summary of the co-located runtimes.
    pub stats: RuntimeStats,
    /// Cache mask applied to the workload, 0 when none.
    pub cache_mask: u64,
    /// Mean runtime relative to the solo baseline, when one is known.
    pub co_slowdown: Option<f64>,
}

impl WorkloadSummary {
    /// Console line: command, mean, deviation, variance, runs, CAT, co-slowdown.
    #[must_use]
    pub fn console_line(&self, cache_enabled: bool) -> String {
        let mut line = format!(
            "{} \t {:9.2}s avg. runtime \t {:1.6} std. dev. \t {:1.6} variance \t {:3} runs",
            self.command, self.stats.mean, self.stats.stddev, self.stats.variance, self.stats.runs
        );
        if cache_enabled {
            line.push_str(&format!("\t {:6x} CAT", self.cache_mask));
        } else {
            line.push_str("\t           ");
        }
        match self.co_slowdown {
            Some(slowdown) => line.push_str(&format!("\t {slowdown:1.6} co-slowdown")),
            None => line.push_str("\t ref missing"),
        }
        line
    }

    /// Tab-separated row appended to the stats file.
    #[must_use]
    pub fn stats_row(&self, cache_enabled: bool) -> String {
        let mut row = format!(
            "{} \t {} \t {} \t {} \t {}",
            self.command, self.stats.mean, self.stats.stddev, self.stats.variance, self.stats.runs
        );
        if cache_enabled {
            row.push_str(&format!("\t {:6x}", self.cache_mask));
        } else {
            row.push_str("\t       ");
        }
        match self.co_slowdown {
            Some(slowdown) => row.push_str(&format!("\t {slowdown:1.6}")),
            None => row.push_str("\t -"),
        }
        row
    }
}
