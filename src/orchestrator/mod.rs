//! Co-execution orchestration.
//!
//! Covers workload launching, the shared completion counter, the per-runner
//! convergence rule, the runner loop, and session setup.

pub mod convergence;
pub mod coordinator;
pub mod launcher;
pub mod runner;
pub mod session_manager;
