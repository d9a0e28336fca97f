//! Linux resctrl allocator.
//!
//! Every workload slot gets its own resource group under the resctrl mount
//! (`<root>/coslowdown-<slot>`). The group's `cpus_list` is set to the
//! workload's CPU set and its `schemata` to an L3 capacity bitmask.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::{CacheAllocator, CacheAssignment};
use crate::{AppError, Result};

/// Prefix of the resource groups created by this allocator.
pub const GROUP_PREFIX: &str = "coslowdown";

/// Writes resource groups into a mounted resctrl filesystem.
#[derive(Debug, Clone)]
pub struct ResctrlAllocator {
    root: PathBuf,
    cache_id: u32,
}

impl ResctrlAllocator {
    /// Construct an allocator for the resctrl mount at `root`, L3 domain 0.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache_id: 0,
        }
    }

    /// Target a different L3 cache domain.
    #[must_use]
    pub fn with_cache_id(mut self, cache_id: u32) -> Self {
        self.cache_id = cache_id;
        self
    }

    /// Directory of the resource group for workload slot `slot`.
    #[must_use]
    pub fn group_dir(&self, slot: usize) -> PathBuf {
        self.root.join(format!("{GROUP_PREFIX}-{slot}"))
    }

    /// `schemata` line granting `mask` on the configured L3 domain.
    #[must_use]
    pub fn schemata_line(&self, mask: u64) -> String {
        format!("L3:{}={mask:x}\n", self.cache_id)
    }

    fn write(path: &Path, contents: &str) -> Result<()> {
        fs::write(path, contents).map_err(|e| {
            AppError::CacheAllocation(format!("failed to write {}: {e}", path.display()))
        })
    }
}

impl CacheAllocator for ResctrlAllocator {
    fn apply(&self, assignments: &[CacheAssignment]) -> Result<()> {
        if !self.root.is_dir() {
            return Err(AppError::CacheAllocation(format!(
                "resctrl root {} is not mounted",
                self.root.display()
            )));
        }

        for (slot, assignment) in assignments.iter().enumerate() {
            if assignment.mask == 0 {
                return Err(AppError::CacheAllocation(format!(
                    "slot {slot} has an empty cache mask"
                )));
            }

            let dir = self.group_dir(slot);
            fs::create_dir_all(&dir).map_err(|e| {
                AppError::CacheAllocation(format!(
                    "failed to create resource group {}: {e}",
                    dir.display()
                ))
            })?;

            Self::write(&dir.join("cpus_list"), &format!("{}\n", assignment.cpus))?;
            Self::write(&dir.join("schemata"), &self.schemata_line(assignment.mask))?;

            info!(
                slot,
                cpus = %assignment.cpus,
                mask = %format_args!("{:x}", assignment.mask),
                "cache partition applied"
            );
        }

        Ok(())
    }
}
