//! Per-iteration sample classification.

/// Verdict for one completed workload iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleClass {
    /// The partner was still iterating; the sample reflects real contention.
    CoLocated,
    /// Every workload had already converged; the sample is discarded.
    SoloTail,
}

impl SampleClass {
    /// Classify an iteration from the completion counter seen when it finished.
    ///
    /// `completed` is the number of workloads that had signalled convergence
    /// and `total` the number of workloads in the session.
    #[must_use]
    pub fn from_counter(completed: usize, total: usize) -> Self {
        if completed < total {
            Self::CoLocated
        } else {
            Self::SoloTail
        }
    }

    /// Whether the sample belongs in the reported runtime sequence.
    #[must_use]
    pub fn is_reported(self) -> bool {
        matches!(self, Self::CoLocated)
    }
}
