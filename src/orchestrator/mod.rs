//! Orchestration loop: run a request sequence and collect outcomes.

mod report;
mod runner;
pub mod sequence;

pub use report::{RequestReport, RunReport, RunSummary};
pub use runner::{dispatch_log, Orchestrator, Reporter, RunAborted};
