//! Workload process launcher.
//!
//! Runs one iteration of a workload as a child process pinned to its CPU
//! set and returns the wall-clock time of that single execution. Output of
//! every iteration is appended to a per-workload log file in the output
//! directory. Children are spawned with `kill_on_drop(true)` so an
//! abandoned session never leaves a benchmark running.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::mode::LaunchMode;
use crate::models::session::WorkloadSpec;
use crate::{AppError, Result};

/// Everything a launcher needs to run one iteration of one workload.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Label of the owning session.
    pub session: String,
    /// Ordinal index of the workload in its session.
    pub workload: usize,
    /// Workload being executed.
    pub spec: WorkloadSpec,
    /// 1-based iteration number.
    pub iteration: u32,
    /// Optional bound on this execution.
    pub timeout: Option<Duration>,
}

impl LaunchRequest {
    /// Build an [`AppError::Execution`] attributed to this request's workload.
    #[must_use]
    pub fn failure(&self, reason: impl Into<String>) -> AppError {
        AppError::Execution {
            workload: self.workload,
            command: self.spec.command.clone(),
            reason: reason.into(),
        }
    }

    /// Log file name: `<session>-<index>[-<mask hex>].log`.
    #[must_use]
    pub fn log_file_name(&self) -> String {
        let mut name = format!("{}-{}", self.session, self.workload);
        if self.spec.cache_mask != 0 {
            name.push_str(&format!("-{:x}", self.spec.cache_mask));
        }
        name.push_str(".log");
        name
    }
}

/// Executes a single workload iteration and reports its elapsed time.
///
/// The core treats a launcher as a black box with exactly two outcomes:
/// success with a duration, or an [`AppError::Execution`].
pub trait WorkloadLauncher: Send + Sync {
    /// Run the workload described by `request` once.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Execution`] if the process cannot be started,
    /// exits unsuccessfully, or exceeds the request's timeout.
    fn launch<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Duration>> + Send + 'a>>;
}

/// Launcher running workloads through `/bin/sh` on the local machine.
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    mode: LaunchMode,
    threads: String,
    log_dir: PathBuf,
}

impl ShellLauncher {
    /// Construct a launcher writing workload output into `log_dir`.
    #[must_use]
    pub fn new(mode: LaunchMode, threads: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            threads: threads.into(),
            log_dir: log_dir.into(),
        }
    }

    /// Build the command for one iteration without redirections.
    #[must_use]
    pub fn build_command(&self, spec: &WorkloadSpec) -> Command {
        match self.mode {
            LaunchMode::Native => {
                let mut cmd = Command::new("/bin/sh");
                cmd.arg("-c")
                    .arg(&spec.command)
                    .env("GOMP_CPU_AFFINITY", &spec.cpu_set)
                    .env("OMP_NUM_THREADS", &self.threads);
                cmd
            }
            LaunchMode::Unikernel => {
                let mut cmd = Command::new("numactl");
                cmd.arg("--physcpubind")
                    .arg(&spec.cpu_set)
                    .args(["/bin/sh", "-c"])
                    .arg(&spec.command)
                    .env("HERMIT_CPUS", &self.threads)
                    .env("HERMIT_MEM", "4G")
                    .env("HERMIT_ISLE", "uhyve");
                cmd
            }
        }
    }

    /// Open the log file; the first iteration truncates, later ones append.
    fn open_log(&self, request: &LaunchRequest) -> Result<File> {
        let path = self.log_dir.join(request.log_file_name());
        let mut options = OpenOptions::new();
        options.create(true);
        if request.iteration <= 1 {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        options
            .open(&path)
            .map_err(|err| request.failure(format!("failed to open log {}: {err}", path.display())))
    }

    async fn run_once(&self, request: &LaunchRequest) -> Result<Duration> {
        let stdout = self.open_log(request)?;
        let stderr = stdout
            .try_clone()
            .map_err(|err| request.failure(format!("failed to duplicate log handle: {err}")))?;

        let mut cmd = self.build_command(&request.spec);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|err| request.failure(format!("failed to spawn: {err}")))?;

        let waited = match request.timeout {
            Some(limit) => {
                let bounded = tokio::time::timeout(limit, child.wait()).await;
                if let Ok(result) = bounded {
                    result
                } else {
                    warn!(
                        workload = request.workload,
                        iteration = request.iteration,
                        ?limit,
                        "workload exceeded iteration timeout, killing"
                    );
                    child.kill().await.ok();
                    return Err(request.failure(format!("timed out after {limit:?}")));
                }
            }
            None => child.wait().await,
        };
        let elapsed = start.elapsed();

        let status = waited.map_err(|err| request.failure(format!("failed to wait: {err}")))?;
        if !status.success() {
            return Err(request.failure(describe_exit(status)));
        }

        debug!(
            workload = request.workload,
            iteration = request.iteration,
            elapsed_ms = elapsed.as_millis(),
            "workload iteration finished"
        );
        Ok(elapsed)
    }
}

impl WorkloadLauncher for ShellLauncher {
    fn launch<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Duration>> + Send + 'a>> {
        Box::pin(self.run_once(request))
    }
}

fn describe_exit(status: ExitStatus) -> String {
    status.code().map_or_else(
        || "terminated by signal".to_owned(),
        |c| format!("exited with code {c}"),
    )
}
