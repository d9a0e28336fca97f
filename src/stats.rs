//! Descriptive statistics over runtime samples.
//!
//! Variance is the population variance (divides by `n`), which is also what
//! the convergence detector compares between iterations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Summary of one workload's reported runtimes, in seconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeStats {
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
    /// Population variance.
    pub variance: f64,
    /// Sum of all runtimes.
    pub sum: f64,
    /// Number of samples.
    pub runs: usize,
}

impl RuntimeStats {
    /// Summarize a sequence of runtimes. An empty sequence yields all zeros.
    #[must_use]
    pub fn from_durations(samples: &[Duration]) -> Self {
        let seconds: Vec<f64> = samples.iter().map(Duration::as_secs_f64).collect();
        Self::from_seconds(&seconds)
    }

    /// Summarize a sequence of runtimes given in seconds.
    #[must_use]
    pub fn from_seconds(samples: &[f64]) -> Self {
        let variance = variance(samples).unwrap_or(0.0);
        Self {
            mean: mean(samples).unwrap_or(0.0),
            stddev: variance.sqrt(),
            variance,
            sum: samples.iter().sum(),
            runs: samples.len(),
        }
    }

    /// Co-slowdown of these stats relative to a solo `reference`.
    ///
    /// `None` when the reference mean is zero or negative.
    #[must_use]
    pub fn co_slowdown(&self, reference: &RuntimeStats) -> Option<f64> {
        (reference.mean > 0.0).then(|| self.mean / reference.mean)
    }
}

/// Arithmetic mean, `None` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)] // sample counts stay far below 2^52
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population variance, `None` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn variance(samples: &[f64]) -> Option<f64> {
    let mean = mean(samples)?;
    let squares: f64 = samples.iter().map(|s| (s - mean).powi(2)).sum();
    Some(squares / samples.len() as f64)
}
