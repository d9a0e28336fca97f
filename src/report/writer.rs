//! Stats file and per-workload measurement file writer.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use super::{ReferenceTable, WorkloadSummary};
use crate::models::session::SessionSpec;
use crate::orchestrator::session_manager::SessionOutcome;
use crate::stats::RuntimeStats;
use crate::{AppError, Result};

/// Name of the cumulative stats file inside the output directory.
pub const STATS_FILE: &str = "stats";

/// Header written when the stats file is created.
pub const STATS_HEADER: &str =
    "cmd \t avg. runtime (s) \t std. dev. \t variance \t runs \t CAT \t co-slowdown\n";

/// Writes session results into an output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
    cache_enabled: bool,
}

impl ReportWriter {
    /// Construct a writer for `output_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory cannot be created.
    pub fn new(output_dir: impl Into<PathBuf>, cache_enabled: bool) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|e| {
            AppError::Io(format!(
                "failed to create output directory {}: {e}",
                output_dir.display()
            ))
        })?;
        Ok(Self {
            output_dir,
            cache_enabled,
        })
    }

    /// Output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Whether CAT columns are emitted.
    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Summarize every workload of a finished session.
    #[must_use]
    pub fn summarize(
        session: &SessionSpec,
        outcome: &SessionOutcome,
        references: &ReferenceTable,
    ) -> Vec<WorkloadSummary> {
        session
            .workloads()
            .iter()
            .zip(&outcome.reports)
            .map(|(workload, report)| {
                let stats = RuntimeStats::from_durations(&report.samples);
                WorkloadSummary {
                    command: workload.command.clone(),
                    co_slowdown: references.co_slowdown(&workload.command, &stats),
                    stats,
                    cache_mask: workload.cache_mask,
                }
            })
            .collect()
    }

    /// Append stats rows and write measurement files for a finished session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Report` if any file cannot be opened or written.
    pub fn record(
        &self,
        session: &SessionSpec,
        outcome: &SessionOutcome,
        references: &ReferenceTable,
    ) -> Result<Vec<WorkloadSummary>> {
        let summaries = Self::summarize(session, outcome, references);

        let mut stats_file = BufWriter::new(self.open_stats_file()?);
        for summary in &summaries {
            writeln!(stats_file, "{}", summary.stats_row(self.cache_enabled))
                .map_err(|e| AppError::Report(format!("stats write failed: {e}")))?;
        }
        stats_file
            .flush()
            .map_err(|e| AppError::Report(format!("stats flush failed: {e}")))?;

        for (index, report) in outcome.reports.iter().enumerate() {
            let path = self.output_dir.join(self.measurement_file_name(session, index));
            let header = self.measurement_header(session, index);
            write_measurements(&path, &header, &report.samples)?;
            debug!(path = %path.display(), samples = report.samples.len(), "measurement file written");
        }

        Ok(summaries)
    }

    /// `<session>-<index>[-<mask hex>].time`.
    #[must_use]
    pub fn measurement_file_name(&self, session: &SessionSpec, index: usize) -> String {
        let mut name = format!("{}-{index}", session.label());
        if self.cache_enabled {
            if let Some(workload) = session.workloads().get(index) {
                name.push_str(&format!("-{:x}", workload.cache_mask));
            }
        }
        name.push_str(".time");
        name
    }

    /// Comment line describing what the measurement file contains.
    #[must_use]
    pub fn measurement_header(&self, session: &SessionSpec, index: usize) -> String {
        let Some(workload) = session.workloads().get(index) else {
            return "# runtime in nanoseconds\n".to_owned();
        };
        let mut header = format!(
            "# runtime in nanoseconds of \"{}\" on CPUs {}",
            workload.command, workload.cpu_set
        );
        match session.partner_of(index) {
            Some(partner) => header.push_str(&format!(
                " while \"{}\" was running on cores {}",
                partner.command, partner.cpu_set
            )),
            None => header.push_str(" running alone"),
        }
        if self.cache_enabled {
            header.push_str(&format!(" with CAT {:6x}", workload.cache_mask));
        }
        header.push('\n');
        header
    }

    /// Open the stats file for appending, writing the header on creation.
    fn open_stats_file(&self) -> Result<File> {
        let path = self.output_dir.join(STATS_FILE);
        let existed = path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AppError::Report(format!("failed to open {}: {e}", path.display())))?;
        if !existed {
            if let Err(e) = file.write_all(STATS_HEADER.as_bytes()) {
                warn!("failed to write stats header: {e}");
                return Err(AppError::Report(format!("stats header write failed: {e}")));
            }
        }
        Ok(file)
    }
}

/// Write `header` followed by one nanosecond value per line.
///
/// # Errors
///
/// Returns `AppError::Report` if the file cannot be created or written.
pub fn write_measurements(path: &Path, header: &str, samples: &[Duration]) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| AppError::Report(format!("failed to create {}: {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    let write_err = |e: std::io::Error| {
        AppError::Report(format!("error while writing measurements file: {e}"))
    };
    out.write_all(header.as_bytes()).map_err(write_err)?;
    for sample in samples {
        writeln!(out, "{}", sample.as_nanos()).map_err(write_err)?;
    }
    out.flush().map_err(write_err)
}
