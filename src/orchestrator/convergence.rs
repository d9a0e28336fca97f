//! Per-runner variance-plateau stopping rule.
//!
//! After a runner has executed its minimum number of iterations it asks its
//! [`ConvergenceDetector`] whether the variance of everything it has observed
//! so far moved by at most the configured tolerance since the previous
//! evaluation. The first evaluation compares against a variance of zero.
//!
//! This is a heuristic plateau detector, not a confidence-interval test: a
//! workload whose runtime keeps drifting may never converge, which points at
//! a misbehaving benchmark rather than a failure of the session.

use crate::stats;

/// Result of one convergence evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Variance (s²) of all samples passed to the evaluation.
    pub variance: f64,
    /// Whether the variance moved by at most the tolerance.
    pub converged: bool,
}

/// Evaluate the plateau rule for `samples` (seconds) against the previous variance.
///
/// Fewer than two samples never converge and report a variance of zero.
#[must_use]
pub fn evaluate(samples: &[f64], previous_variance: f64, tolerance: f64) -> Evaluation {
    if samples.len() < 2 {
        return Evaluation {
            variance: 0.0,
            converged: false,
        };
    }
    let variance = stats::variance(samples).unwrap_or(0.0);
    Evaluation {
        variance,
        converged: (variance - previous_variance).abs() <= tolerance,
    }
}

/// Stateful wrapper that remembers the variance of the previous evaluation.
#[derive(Debug, Clone)]
pub struct ConvergenceDetector {
    tolerance: f64,
    previous_variance: f64,
    evaluations: u32,
}

impl ConvergenceDetector {
    /// Construct a detector with the given variance tolerance (s²).
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            previous_variance: 0.0,
            evaluations: 0,
        }
    }

    /// Evaluate `samples` and remember the resulting variance.
    pub fn observe(&mut self, samples: &[f64]) -> Evaluation {
        let evaluation = evaluate(samples, self.previous_variance, self.tolerance);
        self.previous_variance = evaluation.variance;
        self.evaluations += 1;
        evaluation
    }

    /// Variance recorded by the most recent evaluation.
    #[must_use]
    pub fn previous_variance(&self) -> f64 {
        self.previous_variance
    }

    /// Number of evaluations performed so far.
    #[must_use]
    pub fn evaluations(&self) -> u32 {
        self.evaluations
    }
}
