#![forbid(unsafe_code)]

//! Pairwise co-execution benchmark.
//!
//! Runs one or two workloads concurrently on dedicated CPU sets, keeps only
//! the runtimes measured while both were active, stops once every workload's
//! runtime variance has settled, and reports co-slowdown against solo runs.

pub mod cache;
pub mod config;
pub mod errors;
pub mod mode;
pub mod models;
pub mod orchestrator;
pub mod report;
pub mod stats;

pub use config::BenchConfig;
pub use errors::{AppError, Result};
