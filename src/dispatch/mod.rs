//! Dispatch state machine.
//!
//! Turns a request into a tagged outcome: estimate, select a backend,
//! attempt, classify any failure, and fall back at most once.

pub mod attempts;
mod dispatcher;

pub use attempts::{format_attempt_trail, AttemptRecord, AttemptResult};
pub use dispatcher::{Completion, DispatchError, Dispatcher, FailureStage, Outcome, Tier};
