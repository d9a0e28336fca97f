//! Shared co-execution state for the runners of one session.
//!
//! The [`CoExecutionCoordinator`] owns the completion counter and the
//! error slot. Runners take the counter through [`CoExecutionCoordinator::acquire`],
//! classify their iteration, optionally mark themselves complete, and
//! release it by dropping the [`CounterGuard`]. Only one runner holds the
//! guard at a time, so the classify-then-increment sequence is atomic with
//! respect to the partner.

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::sample::SampleClass;
use crate::AppError;

/// Arbitrates the completion counter and the first-error slot.
#[derive(Debug)]
pub struct CoExecutionCoordinator {
    total: usize,
    completed: Mutex<usize>,
    error: Mutex<Option<AppError>>,
    abort: CancellationToken,
}

impl CoExecutionCoordinator {
    /// Construct a coordinator for `total` concurrently running workloads.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: Mutex::new(0),
            error: Mutex::new(None),
            abort: CancellationToken::new(),
        }
    }

    /// Number of workloads in the session.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Take exclusive access to the completion counter.
    pub async fn acquire(&self) -> CounterGuard<'_> {
        CounterGuard {
            completed: self.completed.lock().await,
            total: self.total,
        }
    }

    /// Current counter value.
    pub async fn completed(&self) -> usize {
        *self.completed.lock().await
    }

    /// Store `err` unless another error got there first.
    ///
    /// Returns `true` when `err` became the session error. Either way the
    /// abort signal is raised so partners stop at their next check.
    pub async fn publish_error(&self, err: AppError) -> bool {
        let mut slot = self.error.lock().await;
        let first = slot.is_none();
        if first {
            warn!(%err, "session aborted by workload failure");
            *slot = Some(err);
        } else {
            debug!(%err, "dropping error, session already failed");
        }
        drop(slot);
        self.abort.cancel();
        first
    }

    /// Whether a runner has already published an error.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// Remove and return the session error, if any.
    pub async fn take_error(&self) -> Option<AppError> {
        self.error.lock().await.take()
    }
}

/// Exclusive handle on the completion counter; released on drop.
#[derive(Debug)]
pub struct CounterGuard<'a> {
    completed: MutexGuard<'a, usize>,
    total: usize,
}

impl CounterGuard<'_> {
    /// Counter value as seen by the holder.
    #[must_use]
    pub fn value(&self) -> usize {
        *self.completed
    }

    /// Classify an iteration that finished while this guard is held.
    #[must_use]
    pub fn classify(&self) -> SampleClass {
        SampleClass::from_counter(*self.completed, self.total)
    }

    /// Record that the holder reached its stopping condition.
    ///
    /// Saturates at the workload count. Returns the new value.
    pub fn mark_completed(&mut self) -> usize {
        if *self.completed < self.total {
            *self.completed += 1;
        }
        *self.completed
    }

    /// Whether every workload has reached its stopping condition.
    #[must_use]
    pub fn all_done(&self) -> bool {
        *self.completed >= self.total
    }
}
