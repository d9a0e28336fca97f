//! Cache-partition configuration applied before a session starts.
//!
//! Provides the [`CacheAllocator`] trait and the resctrl-backed
//! [`ResctrlAllocator`]. The session orchestrator only calls an allocator
//! when every workload of the session asks for a non-zero mask.

pub mod resctrl;

pub use resctrl::ResctrlAllocator;

use crate::Result;

/// Cache allocation requested for one workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheAssignment {
    /// CPU set the workload runs on.
    pub cpus: String,
    /// Capacity bitmask granted to those CPUs.
    pub mask: u64,
}

/// Applies a cache-allocation policy, one assignment per workload.
pub trait CacheAllocator: Send + Sync {
    /// Apply `assignments` in workload order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::CacheAllocation`] if the policy cannot be
    /// written.
    fn apply(&self, assignments: &[CacheAssignment]) -> Result<()>;
}
