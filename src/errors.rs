//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all failure modes of a benchmark run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// A workload process failed to start, exited abnormally, or timed out.
    Execution {
        /// Ordinal index of the workload within its session.
        workload: usize,
        /// Command string of the failing workload.
        command: String,
        /// Underlying failure description.
        reason: String,
    },
    /// Cache-partition configuration could not be applied.
    CacheAllocation(String),
    /// Statistics or report persistence failure.
    Report(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Index of the workload that caused an execution failure, if any.
    #[must_use]
    pub fn workload(&self) -> Option<usize> {
        match self {
            Self::Execution { workload, .. } => Some(*workload),
            _ => None,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Execution {
                workload,
                command,
                reason,
            } => write!(f, "execution: workload {workload} ({command}): {reason}"),
            Self::CacheAllocation(msg) => write!(f, "cache allocation: {msg}"),
            Self::Report(msg) => write!(f, "report: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Report(format!("invalid reference table: {err}"))
    }
}
