//! Pipeline orchestration for Pressline.
//!
//! This crate ties the provider adapters together into scheduled runs:
//! [`stages`] holds the per-item steps, [`cover`] the cover polling loop,
//! [`pipeline`] the run orchestrator and [`report`] the terminal summary.

pub mod cover;
pub mod pipeline;
pub mod report;
pub mod stages;
pub mod stats;

#[cfg(test)]
mod testing;

pub use pipeline::{ItemStatus, Pipeline, ProgressReporter, Providers, RunOutcome, SilentProgress};
pub use report::{RunClassification, RunReport};
pub use stats::{RunStats, StageTally};
